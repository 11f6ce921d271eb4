//! Handoff - in-flight work item
//!
//! A handoff is a persisted work-in-progress note with a lifecycle status,
//! an activity phase, and a tried/next narrative, carried across sessions.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status (ordered; see `lifecycle` for the transition rules)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Blocked,
    ReadyForReview,
    Completed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::NotStarted => "not_started",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::ReadyForReview => "ready_for_review",
            Status::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(Status::NotStarted),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "ready_for_review" => Ok(Status::ReadyForReview),
            "completed" => Ok(Status::Completed),
            _ => anyhow::bail!("Unknown status: {}", s),
        }
    }
}

/// Current activity type, orthogonal to status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Research,
    Planning,
    Implementing,
    Review,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Research => "research",
            Phase::Planning => "planning",
            Phase::Implementing => "implementing",
            Phase::Review => "review",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "research" => Ok(Phase::Research),
            "planning" => Ok(Phase::Planning),
            "implementing" => Ok(Phase::Implementing),
            "review" => Ok(Phase::Review),
            _ => anyhow::bail!("Unknown phase: {}", s),
        }
    }
}

/// Outcome of one tried step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Fail,
    Partial,
    Success,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Fail => "fail",
            Outcome::Partial => "partial",
            Outcome::Success => "success",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Outcome::Fail),
            "partial" => Ok(Outcome::Partial),
            "success" => Ok(Outcome::Success),
            _ => anyhow::bail!("Unknown outcome: {}", s),
        }
    }
}

/// One entry in the append-only tried narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriedStep {
    pub description: String,
    pub outcome: Outcome,
}

pub const HANDOFF_ID_PREFIX: &str = "hf-";

/// A handoff - persisted in-progress work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    /// Sequential, prefixed id (e.g. hf-0000001)
    pub id: String,

    pub title: String,

    /// Free-form context (Markdown)
    pub description: String,

    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub phase: Phase,

    /// Append-only
    #[serde(default)]
    pub tried: Vec<TriedStep>,

    /// Next action, free text
    #[serde(default)]
    pub next: String,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation; always >= created_at
    pub updated_at: DateTime<Utc>,

    /// Session ids that touched this handoff (back-references, not ownership)
    #[serde(default)]
    pub linked_sessions: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Orthogonal terminal flag, settable only from Completed
    #[serde(default)]
    pub archived: bool,

    /// Unknown header fields, preserved verbatim in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl Handoff {
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            files: Vec::new(),
            status: Status::NotStarted,
            phase: Phase::Research,
            tried: Vec::new(),
            next: String::new(),
            created_at: now,
            updated_at: now,
            linked_sessions: BTreeSet::new(),
            agent: None,
            archived: false,
            extra: Vec::new(),
        }
    }

    /// Next sequential id given the ids already in the store
    pub fn next_id<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
        let max = existing
            .into_iter()
            .filter_map(|id| id.strip_prefix(HANDOFF_ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{:07}", HANDOFF_ID_PREFIX, max + 1)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Whole days since creation
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.created_at.date_naive()).num_days().max(0)
    }

    /// Whole days since the last mutation; drives the blocked clock
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.updated_at.date_naive()).num_days().max(0)
    }

    /// Cycle time for completed handoffs, by calendar date
    pub fn cycle_days(&self) -> i64 {
        (self.updated_at.date_naive() - self.created_at.date_naive()).num_days()
    }

    /// Not yet completed (archival implies completed)
    pub fn is_active(&self) -> bool {
        self.status != Status::Completed
    }

    /// Blocked and quiet beyond the alert threshold
    pub fn is_stale(&self, now: DateTime<Utc>, threshold_days: i64) -> bool {
        self.status == Status::Blocked && self.days_since_update(now) > threshold_days
    }

    /// Dates the record was created/updated, for analytics
    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

impl std::fmt::Display for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({}/{})", self.id, self.title, self.status, self.phase)
    }
}
