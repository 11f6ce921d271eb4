//! Handoff lifecycle
//!
//! Validates and applies status transitions. The machine:
//!
//! ```text
//! not_started -> in_progress
//! in_progress <-> blocked
//! in_progress -> ready_for_review -> in_progress | completed
//! in_progress -> completed
//! completed -> archived (one-way flag)
//! ```
//!
//! An illegal request fails with `InvalidTransition` naming both states and
//! mutates nothing. Completed and archived handoffs are immutable apart from
//! archival itself.

use chrono::{DateTime, Utc};

use super::handoff::{Handoff, Outcome, Status, TriedStep};
use super::{LoreError, Result};

/// Before/after record of one applied transition
///
/// Completion reports feed downstream lesson extraction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TransitionReport {
    pub id: String,
    pub from: Status,
    pub to: Status,
    pub at: DateTime<Utc>,
}

/// Is `from -> to` a legal status move?
pub fn can_transition(from: Status, to: Status) -> bool {
    use Status::*;
    matches!(
        (from, to),
        (NotStarted, InProgress)
            | (InProgress, Blocked)
            | (Blocked, InProgress)
            | (InProgress, ReadyForReview)
            | (ReadyForReview, InProgress)
            | (ReadyForReview, Completed)
            | (InProgress, Completed)
    )
}

fn invalid(handoff: &Handoff, to: &str) -> LoreError {
    let from = if handoff.archived {
        "archived".to_string()
    } else {
        handoff.status.to_string()
    };
    LoreError::InvalidTransition {
        from,
        to: to.to_string(),
    }
}

/// Apply a status transition, refreshing `updated_at`
///
/// Moving into Blocked restarts the blocked clock (staleness is measured
/// from `updated_at`). Returns the before/after report.
pub fn transition(handoff: &mut Handoff, to: Status, now: DateTime<Utc>) -> Result<TransitionReport> {
    if handoff.archived || !can_transition(handoff.status, to) {
        return Err(invalid(handoff, &to.to_string()));
    }

    let from = handoff.status;
    handoff.status = to;
    handoff.updated_at = now.max(handoff.created_at);

    Ok(TransitionReport {
        id: handoff.id.clone(),
        from,
        to,
        at: handoff.updated_at,
    })
}

/// Set the archived flag; legal only from Completed, and one-way
pub fn archive(handoff: &mut Handoff, now: DateTime<Utc>) -> Result<()> {
    if handoff.archived || handoff.status != Status::Completed {
        return Err(invalid(handoff, "archived"));
    }
    handoff.archived = true;
    handoff.updated_at = now.max(handoff.created_at);
    Ok(())
}

/// Append a tried step; rejected on completed/archived handoffs
pub fn record_step(
    handoff: &mut Handoff,
    description: impl Into<String>,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Result<()> {
    if handoff.archived || handoff.status == Status::Completed {
        return Err(invalid(handoff, handoff.status.to_string().as_str()));
    }
    handoff.tried.push(TriedStep {
        description: description.into(),
        outcome,
    });
    handoff.updated_at = now.max(handoff.created_at);
    Ok(())
}

/// Link a session id to a handoff (back-reference); no-op when already linked
pub fn link_session(handoff: &mut Handoff, session: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
    if handoff.archived || handoff.status == Status::Completed {
        return Err(invalid(handoff, handoff.status.to_string().as_str()));
    }
    if handoff.linked_sessions.insert(session.into()) {
        handoff.updated_at = now.max(handoff.created_at);
    }
    Ok(())
}
