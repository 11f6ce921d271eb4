//! Core module - Business logic
//!
//! Contains the record model, markdown codec, scoring, lifecycle and
//! analytics for lore.

pub mod codec;
pub mod dedup;
pub mod directive;
pub mod flow;
pub mod handoff;
pub mod lesson;
pub mod lifecycle;
pub mod score;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

/// Core error taxonomy
///
/// Policy: hook handlers degrade to an empty-but-valid result on `Parse`,
/// `LockTimeout` and `Io`; only `InvalidTransition` (a contract violation by
/// the caller) is surfaced to direct CLI callers.
#[derive(Debug, Error)]
pub enum LoreError {
    /// Structurally invalid record document
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Illegal lifecycle change, named by both states
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Could not take the file lock within the deadline
    #[error("lock timeout on {path}")]
    LockTimeout { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoreError>;
