//! Dedup / session tracker
//!
//! Hook processes are short-lived, so "already injected this session" state
//! lives on disk: one append-only marker file per session id under the
//! state directory, one content fingerprint per line. Two hook events
//! firing back to back race on the same file; appends go through the same
//! advisory lock the record store uses.
//!
//! Fingerprints hash stable content (record id + content hash), never
//! volatile fields like `updated_at`, so metadata churn does not defeat
//! dedup.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::store::FileLock;
use super::Result;

/// Stable fingerprint for a record's content-relevant fields
pub fn fingerprint(record_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    // 16 bytes is plenty for per-session dedup
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Per-session emission tracker backed by marker files
pub struct SessionTracker {
    state_dir: PathBuf,
    lock_timeout: Duration,
}

impl SessionTracker {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            lock_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn marker_path(&self, session: &str) -> PathBuf {
        // Session ids come from the host; keep the filename tame
        let safe: String = session
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.state_dir.join(format!("{}.markers", safe))
    }

    /// Fingerprints already emitted for this session
    pub fn seen(&self, session: &str) -> HashSet<String> {
        match std::fs::read_to_string(self.marker_path(session)) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            // A missing marker file is a fresh session
            Err(_) => HashSet::new(),
        }
    }

    /// Keep only the items not previously emitted for this session
    pub fn filter_new<T>(&self, session: &str, items: Vec<T>, fp: impl Fn(&T) -> String) -> Vec<T> {
        let seen = self.seen(session);
        items.into_iter().filter(|item| !seen.contains(&fp(item))).collect()
    }

    /// Record fingerprints as emitted (re-read-merge-append under lock)
    pub fn mark_emitted(&self, session: &str, fingerprints: &[String]) -> Result<()> {
        if fingerprints.is_empty() {
            return Ok(());
        }
        let path = self.marker_path(session);
        let _lock = FileLock::acquire(&path, self.lock_timeout)?;

        // Re-read inside the lock; a racing invocation may have appended
        let seen = self.seen(session);
        let fresh: Vec<&String> = fingerprints.iter().filter(|fp| !seen.contains(*fp)).collect();
        if fresh.is_empty() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        for fp in &fresh {
            writeln!(file, "{}", fp)?;
        }
        debug!(session, appended = fresh.len(), "dedup markers written");
        Ok(())
    }

    /// Drop marker files for sessions other than the ones given
    pub fn prune_except(&self, keep: &[&str]) -> Result<usize> {
        let keep: HashSet<PathBuf> = keep.iter().map(|s| self.marker_path(s)).collect();
        let mut removed = 0;
        let entries = match std::fs::read_dir(&self.state_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            let is_marker = path.extension().map_or(false, |ext| ext == "markers");
            if is_marker && !keep.contains(&path) {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Suppress a line that duplicates the immediately preceding one
///
/// Cheap repeated-chatter filter applied to injection output.
pub fn squeeze_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.as_ref();
        if out.last().map(String::as_str) != Some(line) {
            out.push(line.to_string());
        }
    }
    out
}
