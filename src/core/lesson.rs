//! Lesson - Core data structure
//!
//! A lesson is the fundamental unit of retained knowledge in lore.
//!
//! # Key Properties
//! - **id**: sequential, stable within one level+project scope
//! - **rating**: 0.0-10.0 accumulated confidence, half-unit steps
//! - **velocity**: recent-reuse rate, separates hot from dormant lessons
//! - **source**: human or AI (AI carries provenance metadata)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scope a lesson applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Applies across all projects
    System,
    /// Scoped to one project directory
    Project,
}

impl Default for Level {
    fn default() -> Self {
        Level::Project
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::System => write!(f, "system"),
            Level::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Level::System),
            "project" => Ok(Level::Project),
            _ => anyhow::bail!("Unknown level: {}", s),
        }
    }
}

/// Lesson category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Pattern,
    Gotcha,
    Workflow,
    Tooling,
    Testing,
    Architecture,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Pattern => "pattern",
            Category::Gotcha => "gotcha",
            Category::Workflow => "workflow",
            Category::Tooling => "tooling",
            Category::Testing => "testing",
            Category::Architecture => "architecture",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" => Ok(Category::Pattern),
            "gotcha" => Ok(Category::Gotcha),
            "workflow" => Ok(Category::Workflow),
            "tooling" => Ok(Category::Tooling),
            "testing" => Ok(Category::Testing),
            "architecture" => Ok(Category::Architecture),
            _ => anyhow::bail!("Unknown category: {}", s),
        }
    }
}

/// Where a lesson came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum LessonSource {
    Human,
    /// AI-sourced lessons carry provenance
    Ai {
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
}

impl Default for LessonSource {
    fn default() -> Self {
        LessonSource::Ai {
            model: None,
            session: None,
        }
    }
}

impl LessonSource {
    pub fn tag(&self) -> &'static str {
        match self {
            LessonSource::Human => "human",
            LessonSource::Ai { .. } => "ai",
        }
    }
}

/// Rating bounds and granularity
pub const RATING_MAX: f32 = 10.0;
pub const RATING_STEP: f32 = 0.5;

/// A lesson - a persisted, ratable unit of learned knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Sequential id, unique within a level+project scope
    pub id: u64,

    /// Short description
    pub title: String,

    /// Full content (Markdown)
    pub body: String,

    #[serde(default)]
    pub level: Level,

    #[serde(default)]
    pub category: Category,

    /// Accumulated confidence, 0.0-10.0 in half-unit steps
    #[serde(default)]
    pub rating: f32,

    /// Times applied/confirmed
    #[serde(default)]
    pub uses: u32,

    /// Recent-reuse rate (uses per recent window)
    #[serde(default)]
    pub velocity: f32,

    pub learned_at: NaiveDate,

    /// Always >= learned_at
    pub last_used_at: NaiveDate,

    #[serde(default)]
    pub source: LessonSource,

    /// Unknown header fields, preserved verbatim in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl Lesson {
    /// Create a new lesson learned today
    pub fn new(id: u64, title: impl Into<String>, body: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            level: Level::default(),
            category: Category::default(),
            rating: 1.0,
            uses: 0,
            velocity: 0.0,
            learned_at: today,
            last_used_at: today,
            source: LessonSource::default(),
            extra: Vec::new(),
        }
    }

    /// Set level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set source
    pub fn with_source(mut self, source: LessonSource) -> Self {
        self.source = source;
        self
    }

    /// Record a successful application of this lesson
    ///
    /// Bumps uses and rating (half step, capped), refreshes last_used_at and
    /// folds the reuse into velocity. Rating and uses never decrease here.
    pub fn record_use(&mut self, today: NaiveDate) {
        self.uses = self.uses.saturating_add(1);
        self.rating = clamp_rating(self.rating + RATING_STEP);
        // Exponential moving rate: recent reuse counts more than history
        self.velocity = self.velocity * 0.5 + 1.0;
        if today > self.last_used_at {
            self.last_used_at = today;
        }
    }

    /// Explicit demotion - the only sanctioned rating decrease
    pub fn demote(&mut self) {
        self.rating = clamp_rating(self.rating - RATING_STEP * 2.0);
    }

    /// Days since last confirmed use
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.last_used_at).num_days().max(0)
    }

    /// Format as lesson id (e.g. L-0042)
    pub fn lore_id(&self) -> String {
        format!("L-{:04}", self.id)
    }
}

/// Snap a rating to the half-unit grid inside [0, RATING_MAX]
pub fn clamp_rating(rating: f32) -> f32 {
    let snapped = (rating / RATING_STEP).round() * RATING_STEP;
    snapped.clamp(0.0, RATING_MAX)
}

impl std::fmt::Display for Lesson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.lore_id(), self.title, self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_lesson() {
        let lesson = Lesson::new(1, "Timeouts are 30s", "The API timeout is 30 seconds.", day("2026-02-01"));

        assert_eq!(lesson.id, 1);
        assert_eq!(lesson.rating, 1.0);
        assert_eq!(lesson.uses, 0);
        assert_eq!(lesson.learned_at, lesson.last_used_at);
        assert_eq!(lesson.level, Level::Project);
    }

    #[test]
    fn test_record_use_bumps_counters() {
        let mut lesson = Lesson::new(1, "T", "B", day("2026-01-01"));
        lesson.record_use(day("2026-02-01"));

        assert_eq!(lesson.uses, 1);
        assert_eq!(lesson.rating, 1.5);
        assert_eq!(lesson.last_used_at, day("2026-02-01"));
        assert!(lesson.velocity > 0.0);
    }

    #[test]
    fn test_record_use_never_rewinds_last_used() {
        let mut lesson = Lesson::new(1, "T", "B", day("2026-02-01"));
        lesson.record_use(day("2026-01-01"));
        assert_eq!(lesson.last_used_at, day("2026-02-01"));
    }

    #[test]
    fn test_rating_caps_at_max() {
        let mut lesson = Lesson::new(1, "T", "B", day("2026-01-01"));
        for _ in 0..40 {
            lesson.record_use(day("2026-01-02"));
        }
        assert_eq!(lesson.rating, RATING_MAX);
        assert_eq!(lesson.uses, 40);
    }

    #[test]
    fn test_demote_decreases_rating() {
        let mut lesson = Lesson::new(1, "T", "B", day("2026-01-01"));
        lesson.rating = 5.0;
        lesson.demote();
        assert_eq!(lesson.rating, 4.0);
    }

    #[test]
    fn test_demote_floors_at_zero() {
        let mut lesson = Lesson::new(1, "T", "B", day("2026-01-01"));
        lesson.rating = 0.5;
        lesson.demote();
        assert_eq!(lesson.rating, 0.0);
    }

    #[test]
    fn test_clamp_rating_snaps_to_half_units() {
        assert_eq!(clamp_rating(3.3), 3.5);
        assert_eq!(clamp_rating(3.1), 3.0);
        assert_eq!(clamp_rating(-1.0), 0.0);
        assert_eq!(clamp_rating(12.0), RATING_MAX);
    }

    #[test]
    fn test_level_round_trip() {
        assert_eq!("system".parse::<Level>().unwrap(), Level::System);
        assert_eq!("project".parse::<Level>().unwrap(), Level::Project);
        assert!("global".parse::<Level>().is_err());
        assert_eq!(format!("{}", Level::System), "system");
    }

    #[test]
    fn test_category_round_trip() {
        for c in [
            Category::Pattern,
            Category::Gotcha,
            Category::Workflow,
            Category::Tooling,
            Category::Testing,
            Category::Architecture,
        ] {
            assert_eq!(c.to_string().parse::<Category>().unwrap(), c);
        }
        assert!("misc".parse::<Category>().is_err());
    }

    #[test]
    fn test_lore_id() {
        let lesson = Lesson::new(42, "T", "B", day("2026-01-01"));
        assert_eq!(lesson.lore_id(), "L-0042");
    }

    #[test]
    fn test_age_days() {
        let lesson = Lesson::new(1, "T", "B", day("2026-01-01"));
        assert_eq!(lesson.age_days(day("2026-01-11")), 10);
        // Clock skew never yields a negative age
        assert_eq!(lesson.age_days(day("2025-12-01")), 0);
    }
}
