//! CLI utility functions
//!
//! Shared helpers for locating the project store from the current directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::core::store::RecordStore;

/// Project root for CLI invocations: the current directory
pub fn project_root() -> Result<PathBuf> {
    Ok(std::env::current_dir()?)
}

/// Open the record store for the current project
pub fn open_store(config: &Config) -> Result<RecordStore> {
    let root = project_root()?;
    Ok(RecordStore::new(config.store_paths(&root))
        .with_lock_timeout(Duration::from_millis(config.core.lock_timeout_ms)))
}
