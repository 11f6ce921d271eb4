//! Flow analytics
//!
//! Pure aggregation over handoff and lesson collections: funnel counts,
//! cycle time, blocked alerts. No I/O, no side effects; every function
//! returns a well-defined zero result for empty input.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::handoff::{Handoff, Phase, Status};
use super::lesson::{Lesson, Level};

/// Default for the blocked-alert threshold, in days
pub const DEFAULT_BLOCKED_THRESHOLD_DAYS: i64 = 3;

/// A blocked handoff quiet beyond the alert threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedAlert {
    pub id: String,
    pub title: String,
    pub days_blocked: i64,
}

/// Aggregate pipeline-health statistics for a handoff collection
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowStats {
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    /// Computed over non-completed handoffs only
    pub by_phase: BTreeMap<Phase, usize>,
    /// Mean calendar days from creation to completion, completed only
    pub avg_cycle_days: f64,
    /// Mean age of active handoffs, 0.0 when none
    pub avg_age_days: f64,
    /// completed / total, 0 when total is 0
    pub completion_rate: f64,
    pub active_count: usize,
    pub blocked_count: usize,
    /// Sorted descending by days blocked (most overdue first)
    pub blocked_over_threshold: Vec<BlockedAlert>,
}

/// Compute flow statistics for a handoff collection
pub fn flow_stats(handoffs: &[Handoff], now: DateTime<Utc>, blocked_threshold_days: i64) -> FlowStats {
    let mut stats = FlowStats {
        total: handoffs.len(),
        ..Default::default()
    };

    let mut cycle_sum = 0i64;
    let mut cycle_n = 0usize;
    let mut age_sum = 0i64;
    let mut completed = 0usize;

    for handoff in handoffs {
        *stats.by_status.entry(handoff.status).or_insert(0) += 1;

        if handoff.status == Status::Completed {
            completed += 1;
            let cycle = handoff.cycle_days();
            // Negative cycles are clock skew or bad data; drop, don't fail
            if cycle >= 0 {
                cycle_sum += cycle;
                cycle_n += 1;
            }
        } else {
            // Phase is meaningless once work is done
            *stats.by_phase.entry(handoff.phase).or_insert(0) += 1;
            age_sum += handoff.age_days(now);
        }

        if handoff.status == Status::Blocked {
            stats.blocked_count += 1;
            let days_blocked = handoff.days_since_update(now);
            if days_blocked > blocked_threshold_days {
                stats.blocked_over_threshold.push(BlockedAlert {
                    id: handoff.id.clone(),
                    title: handoff.title.clone(),
                    days_blocked,
                });
            }
        }
    }

    stats.active_count = stats.total - completed;
    if stats.total > 0 {
        stats.completion_rate = completed as f64 / stats.total as f64;
    }
    if cycle_n > 0 {
        stats.avg_cycle_days = cycle_sum as f64 / cycle_n as f64;
    }
    if stats.active_count > 0 {
        stats.avg_age_days = age_sum as f64 / stats.active_count as f64;
    }
    stats
        .blocked_over_threshold
        .sort_by(|a, b| b.days_blocked.cmp(&a.days_blocked).then(a.id.cmp(&b.id)));

    stats
}

/// Lesson counts partitioned by level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LessonCounts {
    pub system: usize,
    pub project: usize,
    pub total: usize,
}

pub fn compute_lesson_counts(lessons: &[Lesson]) -> LessonCounts {
    let mut counts = LessonCounts::default();
    for lesson in lessons {
        match lesson.level {
            Level::System => counts.system += 1,
            Level::Project => counts.project += 1,
        }
        counts.total += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lesson::Level;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn handoff(id: &str, status: Status, created: &str, updated: &str) -> Handoff {
        let mut h = Handoff::new(id, format!("handoff {}", id), ts(created));
        h.status = status;
        h.updated_at = ts(updated);
        h
    }

    #[test]
    fn test_empty_collection_is_all_zeros() {
        let stats = flow_stats(&[], ts("2026-02-10T00:00:00Z"), 3);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.avg_cycle_days, 0.0);
        assert_eq!(stats.avg_age_days, 0.0);
        assert!(stats.by_status.is_empty());
        assert!(stats.blocked_over_threshold.is_empty());
    }

    #[test]
    fn test_spec_scenario_blocked_and_cycle() {
        // blocked, updated 5 days ago; completed, created day0 updated day4
        let now = ts("2026-02-10T12:00:00Z");
        let handoffs = vec![
            handoff("hf-0000001", Status::Blocked, "2026-02-01T12:00:00Z", "2026-02-05T12:00:00Z"),
            handoff("hf-0000002", Status::Completed, "2026-02-01T12:00:00Z", "2026-02-05T12:00:00Z"),
        ];

        let stats = flow_stats(&handoffs, now, 3);
        assert_eq!(stats.blocked_over_threshold.len(), 1);
        let alert = &stats.blocked_over_threshold[0];
        assert_eq!(alert.id, "hf-0000001");
        assert_eq!(alert.days_blocked, 5);
        assert_eq!(stats.avg_cycle_days, 4.0);
    }

    #[test]
    fn test_status_counts_sum_to_total() {
        let now = ts("2026-02-10T00:00:00Z");
        let handoffs = vec![
            handoff("hf-0000001", Status::NotStarted, "2026-02-01T00:00:00Z", "2026-02-01T00:00:00Z"),
            handoff("hf-0000002", Status::InProgress, "2026-02-01T00:00:00Z", "2026-02-02T00:00:00Z"),
            handoff("hf-0000003", Status::Blocked, "2026-02-01T00:00:00Z", "2026-02-03T00:00:00Z"),
            handoff("hf-0000004", Status::Completed, "2026-02-01T00:00:00Z", "2026-02-04T00:00:00Z"),
        ];

        let stats = flow_stats(&handoffs, now, 3);
        let sum: usize = stats.by_status.values().sum();
        assert_eq!(sum, stats.total);
        assert!(stats.completion_rate >= 0.0 && stats.completion_rate <= 1.0);
        assert_eq!(stats.active_count, 3);
        assert_eq!(stats.blocked_count, 1);
    }

    #[test]
    fn test_by_phase_skips_completed() {
        let now = ts("2026-02-10T00:00:00Z");
        let mut done = handoff("hf-0000001", Status::Completed, "2026-02-01T00:00:00Z", "2026-02-02T00:00:00Z");
        done.phase = Phase::Review;
        let mut open = handoff("hf-0000002", Status::InProgress, "2026-02-01T00:00:00Z", "2026-02-02T00:00:00Z");
        open.phase = Phase::Implementing;

        let stats = flow_stats(&[done, open], now, 3);
        assert_eq!(stats.by_phase.get(&Phase::Implementing), Some(&1));
        assert_eq!(stats.by_phase.get(&Phase::Review), None);
        let phase_sum: usize = stats.by_phase.values().sum();
        assert_eq!(phase_sum, stats.active_count);
    }

    #[test]
    fn test_blocked_alerts_sorted_descending() {
        let now = ts("2026-02-20T00:00:00Z");
        let handoffs = vec![
            handoff("hf-0000001", Status::Blocked, "2026-02-01T00:00:00Z", "2026-02-15T00:00:00Z"),
            handoff("hf-0000002", Status::Blocked, "2026-02-01T00:00:00Z", "2026-02-05T00:00:00Z"),
            handoff("hf-0000003", Status::Blocked, "2026-02-01T00:00:00Z", "2026-02-10T00:00:00Z"),
        ];

        let stats = flow_stats(&handoffs, now, 3);
        let days: Vec<i64> = stats.blocked_over_threshold.iter().map(|a| a.days_blocked).collect();
        assert_eq!(days, vec![15, 10, 5]);
    }

    #[test]
    fn test_blocked_at_threshold_is_not_alerted() {
        // Exactly threshold days quiet: not over the threshold
        let now = ts("2026-02-08T00:00:00Z");
        let handoffs = vec![handoff(
            "hf-0000001",
            Status::Blocked,
            "2026-02-01T00:00:00Z",
            "2026-02-05T00:00:00Z",
        )];
        let stats = flow_stats(&handoffs, now, 3);
        assert!(stats.blocked_over_threshold.is_empty());
    }

    #[test]
    fn test_negative_cycle_excluded() {
        let now = ts("2026-02-10T00:00:00Z");
        // Clock skew: updated before created survives parsing only via
        // hand-built records; analytics must not fail on it
        let mut skewed = Handoff::new("hf-0000001", "skewed", ts("2026-02-05T00:00:00Z"));
        skewed.status = Status::Completed;
        skewed.updated_at = ts("2026-02-01T00:00:00Z");
        let ok = handoff("hf-0000002", Status::Completed, "2026-02-01T00:00:00Z", "2026-02-03T00:00:00Z");

        let stats = flow_stats(&[skewed, ok], now, 3);
        assert_eq!(stats.avg_cycle_days, 2.0);
    }

    #[test]
    fn test_lesson_counts_partition_by_level() {
        let day = "2026-01-01".parse().unwrap();
        let lessons = vec![
            Lesson::new(1, "a", "", day).with_level(Level::System),
            Lesson::new(2, "b", "", day).with_level(Level::Project),
            Lesson::new(3, "c", "", day).with_level(Level::Project),
        ];

        let counts = compute_lesson_counts(&lessons);
        assert_eq!(counts.system, 1);
        assert_eq!(counts.project, 2);
        assert_eq!(counts.total, 3);
    }

    #[test]
    fn test_lesson_counts_empty() {
        assert_eq!(compute_lesson_counts(&[]), LessonCounts::default());
    }
}
