//! Record store - locked access to the markdown files
//!
//! One markdown file per record type per scope: a system-level lessons file
//! under the state dir, and a lessons file plus a handoffs file per
//! project-data directory. The store exclusively owns all records for one
//! scope; every invocation re-reads from disk, nothing is cached across
//! hook processes.
//!
//! Writers take an advisory lock on a `.lock` sibling, re-read, merge, and
//! replace the file atomically. Lock acquisition is bounded; contention
//! fails fast with `LockTimeout` instead of hanging the host's hook
//! pipeline.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use super::codec;
use super::handoff::Handoff;
use super::lesson::{Lesson, Level};
use super::{LoreError, Result};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(15);

/// Advisory exclusive lock on a sibling `.lock` file
///
/// Released on drop, so a failing invocation never leaves a stale lock.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire within `timeout`, or fail with `LockTimeout`
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)?;

        let deadline = Instant::now() + timeout;
        loop {
            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file });
            }
            if Instant::now() >= deadline {
                return Err(LoreError::LockTimeout { path: lock_path });
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    name.push_str(".lock");
    target.with_file_name(name)
}

/// Where one scope's record files live
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// System-level lessons, shared across projects
    pub system_lessons: PathBuf,
    /// Project-scoped lessons
    pub project_lessons: PathBuf,
    /// Project-scoped handoffs
    pub project_handoffs: PathBuf,
}

/// The record store for one project-data directory
pub struct RecordStore {
    paths: StorePaths,
    lock_timeout: Duration,
}

impl RecordStore {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            lock_timeout: Duration::from_millis(750),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn lessons_path(&self, level: Level) -> &Path {
        match level {
            Level::System => &self.paths.system_lessons,
            Level::Project => &self.paths.project_lessons,
        }
    }

    // ─── read path: always a full re-read ───

    pub fn load_lessons(&self, level: Level) -> Result<Vec<Lesson>> {
        let path = self.lessons_path(level);
        let text = read_or_empty(path)?;
        let outcome = codec::parse_lessons(&text)?;
        report_skipped(path, &outcome.skipped);
        Ok(outcome.records)
    }

    /// System lessons first, then project lessons
    pub fn load_all_lessons(&self) -> Result<Vec<Lesson>> {
        let mut lessons = self.load_lessons(Level::System)?;
        lessons.extend(self.load_lessons(Level::Project)?);
        Ok(lessons)
    }

    pub fn load_handoffs(&self) -> Result<Vec<Handoff>> {
        let path = &self.paths.project_handoffs;
        let text = read_or_empty(path)?;
        let outcome = codec::parse_handoffs(&text)?;
        report_skipped(path, &outcome.skipped);
        Ok(outcome.records)
    }

    // ─── write path: lock, re-read, merge, replace atomically ───

    /// Append a new lesson, assigning the next id in its scope
    pub fn append_lesson(
        &self,
        level: Level,
        build: impl FnOnce(u64) -> Lesson,
    ) -> Result<Lesson> {
        let path = self.lessons_path(level).to_path_buf();
        let _lock = FileLock::acquire(&path, self.lock_timeout)?;

        let outcome = codec::parse_lessons(&read_or_empty(&path)?)?;
        report_skipped(&path, &outcome.skipped);
        let mut lessons = outcome.records;
        let id = lessons.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        let lesson = build(id);
        lessons.push(lesson.clone());

        write_atomic(&path, &codec::format_lessons(&lessons))?;
        Ok(lesson)
    }

    /// Write back mutated lessons, merging with concurrent writers
    pub fn save_lessons(&self, level: Level, updated: &[Lesson]) -> Result<()> {
        let path = self.lessons_path(level).to_path_buf();
        let _lock = FileLock::acquire(&path, self.lock_timeout)?;

        let outcome = codec::parse_lessons(&read_or_empty(&path)?)?;
        report_skipped(&path, &outcome.skipped);
        let merged = merge_lessons(outcome.records, updated);
        write_atomic(&path, &codec::format_lessons(&merged))
    }

    /// Append a new handoff, assigning the next sequential id
    pub fn append_handoff(
        &self,
        build: impl FnOnce(String) -> Handoff,
    ) -> Result<Handoff> {
        let path = self.paths.project_handoffs.clone();
        let _lock = FileLock::acquire(&path, self.lock_timeout)?;

        let outcome = codec::parse_handoffs(&read_or_empty(&path)?)?;
        report_skipped(&path, &outcome.skipped);
        let mut handoffs = outcome.records;
        let id = Handoff::next_id(handoffs.iter().map(|h| h.id.as_str()));
        let handoff = build(id);
        handoffs.push(handoff.clone());

        write_atomic(&path, &codec::format_handoffs(&handoffs))?;
        Ok(handoff)
    }

    /// Write back mutated handoffs, merging with concurrent writers
    ///
    /// Metadata is last-writer-wins by `updated_at`; the append-only `tried`
    /// narrative and the linked-session set are unioned so a concurrent
    /// writer's append is never lost.
    pub fn save_handoffs(&self, updated: &[Handoff]) -> Result<()> {
        let path = self.paths.project_handoffs.clone();
        let _lock = FileLock::acquire(&path, self.lock_timeout)?;

        let outcome = codec::parse_handoffs(&read_or_empty(&path)?)?;
        report_skipped(&path, &outcome.skipped);
        let merged = merge_handoffs(outcome.records, updated);
        write_atomic(&path, &codec::format_handoffs(&merged))
    }
}

/// Rebuild the session -> handoff ids index from a handoff collection
///
/// Stored nowhere; linked_sessions on the records is the source of truth.
pub fn session_index(handoffs: &[Handoff]) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for handoff in handoffs {
        for session in &handoff.linked_sessions {
            index.entry(session.clone()).or_default().push(handoff.id.clone());
        }
    }
    index
}

fn read_or_empty(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

fn report_skipped(path: &Path, skipped: &[codec::SkippedRecord]) {
    for skip in skipped {
        warn!(
            file = %path.display(),
            line = skip.line,
            reason = %skip.reason,
            "skipped malformed record"
        );
    }
}

/// Replace the file contents via tempfile + rename
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent)?;

    let tmp = tempfile::NamedTempFile::new_in(&parent)?;
    std::fs::write(tmp.path(), contents)?;
    tmp.persist(path).map_err(|e| LoreError::Io(e.error))?;
    debug!(file = %path.display(), bytes = contents.len(), "store written");
    Ok(())
}

fn merge_lessons(current: Vec<Lesson>, updated: &[Lesson]) -> Vec<Lesson> {
    let mut merged = current;
    for lesson in updated {
        match merged.iter_mut().find(|l| l.id == lesson.id) {
            Some(existing) => {
                // Counters only move forward; take the freshest metadata
                let mut base = if lesson.last_used_at >= existing.last_used_at {
                    lesson.clone()
                } else {
                    existing.clone()
                };
                base.rating = base.rating.max(existing.rating).max(lesson.rating);
                base.uses = base.uses.max(existing.uses).max(lesson.uses);
                base.last_used_at = existing.last_used_at.max(lesson.last_used_at);
                *existing = base;
            }
            None => merged.push(lesson.clone()),
        }
    }
    merged
}

fn merge_handoffs(current: Vec<Handoff>, updated: &[Handoff]) -> Vec<Handoff> {
    let mut merged = current;
    for handoff in updated {
        match merged.iter_mut().find(|h| h.id == handoff.id) {
            Some(existing) => {
                let mut base = if handoff.updated_at >= existing.updated_at {
                    handoff.clone()
                } else {
                    existing.clone()
                };
                // Union of both tried narratives, in step order; a step the
                // base is missing is re-appended rather than dropped
                for step in existing.tried.iter().chain(&handoff.tried) {
                    if !base.tried.contains(step) {
                        base.tried.push(step.clone());
                    }
                }
                base.linked_sessions
                    .extend(existing.linked_sessions.iter().cloned());
                base.linked_sessions
                    .extend(handoff.linked_sessions.iter().cloned());
                base.archived = existing.archived || handoff.archived;
                *existing = base;
            }
            None => merged.push(handoff.clone()),
        }
    }
    merged
}
