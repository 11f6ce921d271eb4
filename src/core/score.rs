//! Relevance scoring
//!
//! Ranks lessons for injection based on:
//! - Base confidence from rating
//! - Recency decay (dormant lessons fade, whatever their rating)
//! - Velocity boost for recently-reused lessons
//! - Query match (token overlap against title and body)

use chrono::NaiveDate;

use super::codec::lesson_block;
use super::lesson::{Lesson, RATING_MAX};

/// Scoring configuration
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Half-life of the recency decay, in days
    pub half_life_days: f32,
    /// Weight of the velocity boost
    pub velocity_weight: f32,
    /// Velocity is capped before weighting
    pub velocity_cap: f32,
    /// Weight of the query-match term
    pub match_weight: f32,
    /// Title tokens count this much more than body tokens
    pub title_factor: f32,
    /// Queries longer than this are truncated, not rejected
    pub max_query_len: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            half_life_days: 90.0,
            velocity_weight: 0.05,
            velocity_cap: 4.0,
            match_weight: 0.6,
            title_factor: 2.0,
            max_query_len: 512,
        }
    }
}

/// Relevance scorer
pub struct RelevanceScorer {
    config: ScoreConfig,
}

/// A lesson with its computed score, ready for packing
#[derive(Debug, Clone)]
pub struct RankedLesson {
    pub lesson: Lesson,
    pub score: f32,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self {
            config: ScoreConfig::default(),
        }
    }

    pub fn with_config(config: ScoreConfig) -> Self {
        Self { config }
    }

    /// Score one lesson against an optional query at the given date
    ///
    /// Monotonic in rating and in recency independently; the decay term is
    /// multiplicative so at large gaps recency dominates rating.
    pub fn score(&self, lesson: &Lesson, query: Option<&str>, today: NaiveDate) -> f32 {
        let confidence = lesson.rating / RATING_MAX;
        let age = lesson.age_days(today) as f32;
        let decay = (-age / self.config.half_life_days.max(1.0)).exp();

        let velocity = lesson.velocity.clamp(0.0, self.config.velocity_cap);

        confidence * decay
            + self.config.velocity_weight * velocity
            + self.config.match_weight * self.query_match(lesson, query)
    }

    /// Token overlap between the query and the lesson text, in [0, 1]
    ///
    /// No query is neutral: every lesson gets 0 and ranking falls back to
    /// recency and confidence.
    fn query_match(&self, lesson: &Lesson, query: Option<&str>) -> f32 {
        let query = match query {
            Some(q) if !q.trim().is_empty() => truncate_query(q, self.config.max_query_len),
            _ => return 0.0,
        };

        let tokens: Vec<String> = tokenize(query);
        if tokens.is_empty() {
            return 0.0;
        }

        let title = lesson.title.to_lowercase();
        let body = lesson.body.to_lowercase();

        let mut hits = 0.0f32;
        for token in &tokens {
            if title.contains(token.as_str()) {
                hits += self.config.title_factor;
            } else if body.contains(token.as_str()) {
                hits += 1.0;
            }
        }
        hits / (tokens.len() as f32 * self.config.title_factor)
    }

    /// Rank lessons by score, descending, with a stable tie order:
    /// higher rating, then more recent last_used_at, then lower id.
    pub fn rank(&self, lessons: &[Lesson], query: Option<&str>, today: NaiveDate) -> Vec<RankedLesson> {
        let mut ranked: Vec<RankedLesson> = lessons
            .iter()
            .map(|lesson| RankedLesson {
                score: self.score(lesson, query, today),
                lesson: lesson.clone(),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.lesson.rating.total_cmp(&a.lesson.rating))
                .then(b.lesson.last_used_at.cmp(&a.lesson.last_used_at))
                .then(a.lesson.id.cmp(&b.lesson.id))
        });
        ranked
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut a query at the cap without splitting a UTF-8 boundary
fn truncate_query(query: &str, max_len: usize) -> &str {
    if query.len() <= max_len {
        return query;
    }
    let mut end = max_len;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    &query[..end]
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Fit as many whole lessons as possible under a byte budget
///
/// Greedy first-fit in rank order; a lesson that does not fit is skipped and
/// packing continues with the next one. Never truncates a lesson body.
pub fn pack_lessons(ranked: &[RankedLesson], byte_budget: usize) -> Vec<Lesson> {
    let mut spent = 0usize;
    let mut packed = Vec::new();

    for entry in ranked {
        let size = lesson_block(&entry.lesson).len();
        if spent + size <= byte_budget {
            spent += size;
            packed.push(entry.lesson.clone());
        }
    }
    packed
}
