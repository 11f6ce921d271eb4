//! Configuration module
//!
//! Resolved once per invocation and passed down; nothing in core reads
//! settings or directories ad hoc mid-algorithm.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::store::StorePaths;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub inject: InjectConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Debug verbosity (0 = quiet, 1 = debug, 2 = trace)
    #[serde(default)]
    pub debug: u8,

    /// Override for the process-wide state directory
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Lock acquisition budget in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            debug: 0,
            state_dir: None,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    750
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectConfig {
    /// Byte budget for the injection payload
    #[serde(default = "default_byte_budget")]
    pub byte_budget: usize,

    /// Queries longer than this are truncated before matching
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            byte_budget: default_byte_budget(),
            max_query_len: default_max_query_len(),
        }
    }
}

fn default_byte_budget() -> usize {
    6000
}

fn default_max_query_len() -> usize {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Days a blocked handoff may sit quiet before it is alerted
    #[serde(default = "default_blocked_threshold_days")]
    pub blocked_threshold_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            blocked_threshold_days: default_blocked_threshold_days(),
        }
    }
}

fn default_blocked_threshold_days() -> i64 {
    3
}

impl Config {
    /// Load config from default locations
    pub fn load() -> Result<Self> {
        // Try local config first, then global
        if let Some(local) = Self::find_local_config() {
            return Self::load_from(&local);
        }

        let global = Self::global_config_path();
        if global.exists() {
            return Self::load_from(&global);
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find local .lore/config.toml walking up directories
    pub fn find_local_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(".lore").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Find the local .lore project-data directory walking up from a root
    pub fn find_project_data(root: &Path) -> Option<PathBuf> {
        let mut current = root.to_path_buf();

        loop {
            let data_dir = current.join(".lore");
            if data_dir.exists() {
                return Some(data_dir);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Global config path (~/.lore/config.toml, override with LORE_STATE_DIR)
    pub fn global_config_path() -> PathBuf {
        Self::default_state_dir().join("config.toml")
    }

    /// Process-wide state directory
    ///
    /// Priority: config override, LORE_STATE_DIR, ~/.lore
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.core.state_dir {
            return dir.clone();
        }
        Self::default_state_dir()
    }

    fn default_state_dir() -> PathBuf {
        if let Ok(env_dir) = std::env::var("LORE_STATE_DIR") {
            return PathBuf::from(env_dir);
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".lore"))
            .unwrap_or_else(|| PathBuf::from(".lore"))
    }

    /// Project-data directory for a project root
    ///
    /// Priority: LORE_DATA_DIR, nearest .lore/ walking up, <root>/.lore
    pub fn project_data_dir(&self, project_root: &Path) -> PathBuf {
        if let Ok(env_dir) = std::env::var("LORE_DATA_DIR") {
            return PathBuf::from(env_dir);
        }
        Self::find_project_data(project_root).unwrap_or_else(|| project_root.join(".lore"))
    }

    /// Record-file paths for a project root
    pub fn store_paths(&self, project_root: &Path) -> StorePaths {
        let data_dir = self.project_data_dir(project_root);
        StorePaths {
            system_lessons: self.state_dir().join("lessons.md"),
            project_lessons: data_dir.join("lessons.md"),
            project_handoffs: data_dir.join("handoffs.md"),
        }
    }

    /// Dedup marker directory under the state dir
    pub fn dedup_dir(&self) -> PathBuf {
        self.state_dir().join("dedup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.core.debug, 0);
        assert_eq!(config.inject.byte_budget, 6000);
        assert_eq!(config.inject.max_query_len, 512);
        assert_eq!(config.alerts.blocked_threshold_days, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[alerts]\nblocked_threshold_days = 7\n").unwrap();
        assert_eq!(config.alerts.blocked_threshold_days, 7);
        assert_eq!(config.inject.byte_budget, 6000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.core.debug = 2;
        config.inject.byte_budget = 1234;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.core.debug, 2);
        assert_eq!(loaded.inject.byte_budget, 1234);
    }

    #[test]
    fn test_store_paths_layout() {
        let config = Config {
            core: CoreConfig {
                state_dir: Some(PathBuf::from("/tmp/lore-state")),
                ..Default::default()
            },
            ..Default::default()
        };
        // Missing project data dir falls back to <root>/.lore
        let paths = config.store_paths(Path::new("/tmp/no-such-project"));
        assert_eq!(paths.system_lessons, PathBuf::from("/tmp/lore-state/lessons.md"));
        assert!(paths.project_lessons.ends_with(".lore/lessons.md"));
        assert!(paths.project_handoffs.ends_with(".lore/handoffs.md"));
    }
}
