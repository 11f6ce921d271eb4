//! Hook handlers
//!
//! One short-lived process per host lifecycle event. Handlers load the
//! store fresh, do their work, and emit a payload for the host. A broken
//! knowledge store must never break the assistant session: every failure
//! here degrades to an empty payload plus a debug log entry.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::dedup::{fingerprint, squeeze_lines, SessionTracker};
use crate::core::directive::{parse_directives, Directive};
use crate::core::handoff::{Handoff, Status};
use crate::core::lesson::{Lesson, LessonSource, Level};
use crate::core::lifecycle::{self, TransitionReport};
use crate::core::score::{pack_lessons, RelevanceScorer, ScoreConfig};
use crate::core::store::RecordStore;
use crate::core::{codec, LoreError};

/// Event payload consumed from the host
#[derive(Debug, Clone, Deserialize)]
pub struct HookEvent {
    /// Event name (session-start, tool-use, stop)
    #[serde(default, alias = "hook_event_name")]
    pub event: String,

    /// Project root the session runs in
    #[serde(default, alias = "cwd")]
    pub project_root: Option<PathBuf>,

    #[serde(default)]
    pub session_id: Option<String>,

    /// Optional relevance hint (e.g. the user's opening prompt)
    #[serde(default)]
    pub query: Option<String>,

    /// Assistant output to scan for directives (stop-style events)
    #[serde(default, alias = "assistant_output")]
    pub output: Option<String>,
}

/// Injection payload produced for session-start and tool-use events
#[derive(Debug, Clone, Default, Serialize)]
pub struct Injection {
    /// Injectable text, empty when there is nothing new
    pub text: String,
    pub lesson_count: usize,
    pub handoff_count: usize,
}

/// Structured result for stop events
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopReport {
    /// Ids of lessons recorded from directives
    pub lessons_added: Vec<String>,
    /// Handoff ids that received a tried step
    pub steps_recorded: Vec<String>,
    /// Before/after reports of completed handoffs
    pub completions: Vec<TransitionReport>,
    /// Directives that could not be applied
    pub rejected: Vec<String>,
}

fn store_for(config: &Config, event: &HookEvent) -> RecordStore {
    let root = event
        .project_root
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    RecordStore::new(config.store_paths(&root))
        .with_lock_timeout(Duration::from_millis(config.core.lock_timeout_ms))
}

fn session_of(event: &HookEvent) -> String {
    event.session_id.clone().unwrap_or_else(|| "default".to_string())
}

fn lesson_fingerprint(lesson: &Lesson) -> String {
    fingerprint(&lesson.lore_id(), &format!("{}\n{}", lesson.title, lesson.body))
}

/// Stable over content, not over metadata churn
fn handoff_fingerprint(handoff: &Handoff) -> String {
    let steps: Vec<String> = handoff
        .tried
        .iter()
        .map(|s| format!("{}:{}", s.outcome, s.description))
        .collect();
    fingerprint(
        &handoff.id,
        &format!("{}\n{}\n{}", handoff.title, steps.join("\n"), handoff.next),
    )
}

fn handoff_summary(handoff: &Handoff) -> String {
    let mut line = format!(
        "- {} {} [{}/{}]",
        handoff.id, handoff.title, handoff.status, handoff.phase
    );
    if !handoff.next.is_empty() {
        line.push_str(&format!(" — next: {}", handoff.next));
    }
    line
}

/// Build the injection for session-start and tool-use events
///
/// Ranks lessons, packs whole lessons under the byte budget, filters both
/// lessons and active handoffs through the session dedup tracker, and
/// squeezes repeated lines. Degrades to an empty payload on any store
/// failure.
pub fn run_injection(config: &Config, event: &HookEvent) -> Injection {
    match build_injection(config, event) {
        Ok(injection) => injection,
        Err(e) => {
            debug!(error = %e, "injection degraded to empty");
            Injection::default()
        }
    }
}

fn build_injection(config: &Config, event: &HookEvent) -> crate::core::Result<Injection> {
    let store = store_for(config, event);
    let session = session_of(event);
    let tracker = SessionTracker::new(config.dedup_dir())
        .with_lock_timeout(Duration::from_millis(config.core.lock_timeout_ms));

    let lessons = store.load_all_lessons()?;
    let handoffs = store.load_handoffs()?;

    let scorer = RelevanceScorer::with_config(ScoreConfig {
        max_query_len: config.inject.max_query_len,
        ..ScoreConfig::default()
    });
    let today = Utc::now().date_naive();
    let ranked = scorer.rank(&lessons, event.query.as_deref(), today);
    let packed = pack_lessons(&ranked, config.inject.byte_budget);

    let fresh_lessons = tracker.filter_new(&session, packed, lesson_fingerprint);

    let active: Vec<Handoff> = handoffs
        .into_iter()
        .filter(|h| h.is_active() && !h.archived)
        .collect();
    let fresh_handoffs = tracker.filter_new(&session, active, handoff_fingerprint);

    let mut lines: Vec<String> = Vec::new();
    if !fresh_lessons.is_empty() {
        lines.push("# Lessons worth remembering".to_string());
        for lesson in &fresh_lessons {
            lines.push(codec::lesson_block(lesson).trim_end().to_string());
        }
    }
    if !fresh_handoffs.is_empty() {
        lines.push("# Open handoffs".to_string());
        for handoff in &fresh_handoffs {
            lines.push(handoff_summary(handoff));
        }
    }
    let text = squeeze_lines(&lines).join("\n");

    let mut emitted: Vec<String> = fresh_lessons.iter().map(lesson_fingerprint).collect();
    emitted.extend(fresh_handoffs.iter().map(handoff_fingerprint));
    tracker.mark_emitted(&session, &emitted)?;

    Ok(Injection {
        text,
        lesson_count: fresh_lessons.len(),
        handoff_count: fresh_handoffs.len(),
    })
}

/// Apply directives found in assistant output (stop-style events)
///
/// Store failures degrade to an empty report; an individually inapplicable
/// directive lands in `rejected` without aborting the rest.
pub fn run_stop(config: &Config, event: &HookEvent) -> StopReport {
    let output = match &event.output {
        Some(text) => text.as_str(),
        None => return StopReport::default(),
    };

    let directives = parse_directives(output);
    if directives.is_empty() {
        return StopReport::default();
    }

    let store = store_for(config, event);
    let session = session_of(event);
    let now = Utc::now();
    let mut report = StopReport::default();

    for directive in directives {
        let result = apply_directive(&store, &session, directive, &mut report, now);
        if let Err(e) = result {
            match e {
                LoreError::InvalidTransition { .. } => report.rejected.push(e.to_string()),
                other => {
                    // Store-level failure: log and keep the hook alive
                    debug!(error = %other, "directive application degraded");
                }
            }
        }
    }

    report
}

fn apply_directive(
    store: &RecordStore,
    session: &str,
    directive: Directive,
    report: &mut StopReport,
    now: chrono::DateTime<Utc>,
) -> crate::core::Result<()> {
    match directive {
        Directive::NewLesson { title, body, category } => {
            let session = session.to_string();
            let lesson = store.append_lesson(Level::Project, |id| {
                let mut lesson = Lesson::new(id, title, body, now.date_naive());
                if let Some(category) = category {
                    lesson.category = category;
                }
                lesson.source = LessonSource::Ai {
                    model: None,
                    session: Some(session),
                };
                lesson
            })?;
            report.lessons_added.push(lesson.lore_id());
        }
        Directive::NewHandoffStep { id, description, outcome } => {
            let mut handoffs = store.load_handoffs()?;
            let Some(handoff) = handoffs.iter_mut().find(|h| h.id == id) else {
                report.rejected.push(format!("unknown handoff: {}", id));
                return Ok(());
            };
            // Work arriving means work started
            if handoff.status == Status::NotStarted {
                lifecycle::transition(handoff, Status::InProgress, now)?;
            }
            lifecycle::record_step(handoff, description, outcome, now)?;
            lifecycle::link_session(handoff, session, now)?;
            store.save_handoffs(&[handoff.clone()])?;
            report.steps_recorded.push(id);
        }
        Directive::CompleteHandoff { id } => {
            let mut handoffs = store.load_handoffs()?;
            let Some(handoff) = handoffs.iter_mut().find(|h| h.id == id) else {
                report.rejected.push(format!("unknown handoff: {}", id));
                return Ok(());
            };
            let completion = lifecycle::transition(handoff, Status::Completed, now)?;
            store.save_handoffs(&[handoff.clone()])?;
            report.completions.push(completion);
        }
    }
    Ok(())
}

/// Dispatch a host event by name
pub fn dispatch(config: &Config, event: &HookEvent) -> serde_json::Value {
    match event.event.replace('_', "-").to_lowercase().as_str() {
        "session-start" | "sessionstart" => {
            serde_json::to_value(run_injection(config, event)).unwrap_or_default()
        }
        "tool-use" | "post-tool-use" | "posttooluse" => {
            serde_json::to_value(run_injection(config, event)).unwrap_or_default()
        }
        "stop" | "session-stop" => {
            serde_json::to_value(run_stop(config, event)).unwrap_or_default()
        }
        other => {
            warn!(event = other, "unknown hook event");
            serde_json::Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handoff::Outcome;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.core.state_dir = Some(dir.join("state"));
        config
    }

    fn event(name: &str, root: &std::path::Path, session: &str) -> HookEvent {
        HookEvent {
            event: name.to_string(),
            project_root: Some(root.to_path_buf()),
            session_id: Some(session.to_string()),
            query: None,
            output: None,
        }
    }

    fn seeded_store(config: &Config, root: &std::path::Path) -> RecordStore {
        let store = RecordStore::new(config.store_paths(root));
        store
            .append_lesson(Level::Project, |id| {
                Lesson::new(id, "Flag-gate migrations", "Stage risky changes.", Utc::now().date_naive())
            })
            .unwrap();
        store
            .append_handoff(|id| {
                let mut h = Handoff::new(id, "Migrate loader", Utc::now());
                h.status = Status::InProgress;
                h.next = "wire into main".to_string();
                h
            })
            .unwrap();
        store
    }

    #[test]
    fn test_injection_then_dedup_suppresses_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        let config = test_config(dir.path());
        seeded_store(&config, &root);

        let ev = event("session-start", &root, "sess-1");
        let first = run_injection(&config, &ev);
        assert_eq!(first.lesson_count, 1);
        assert_eq!(first.handoff_count, 1);
        assert!(first.text.contains("Flag-gate migrations"));
        assert!(first.text.contains("hf-0000001"));

        // Second invocation in the same session: nothing new
        let second = run_injection(&config, &ev);
        assert_eq!(second.lesson_count, 0);
        assert_eq!(second.handoff_count, 0);
        assert!(second.text.is_empty());

        // A new session sees everything again
        let other = run_injection(&config, &event("session-start", &root, "sess-2"));
        assert_eq!(other.lesson_count, 1);
    }

    #[test]
    fn test_injection_degrades_on_broken_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let config = test_config(dir.path());
        std::fs::create_dir_all(root.join(".lore")).unwrap();
        // Structurally invalid document: wrong top header
        std::fs::write(root.join(".lore/lessons.md"), "# Handoffs\n").unwrap();

        let injection = run_injection(&config, &event("session-start", &root, "sess-1"));
        assert!(injection.text.is_empty());
        assert_eq!(injection.lesson_count, 0);
    }

    #[test]
    fn test_stop_applies_directives() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        let config = test_config(dir.path());
        let store = seeded_store(&config, &root);

        let mut ev = event("stop", &root, "sess-1");
        ev.output = Some(
            "Did the work.\n\
             LESSON: [gotcha] Loader panics on missing keys :: Guard with defaults.\n\
             HANDOFF: hf-0000001 tried(success): staged behind a flag\n\
             HANDOFF: hf-0000001 done\n"
                .to_string(),
        );

        let report = run_stop(&config, &ev);
        assert_eq!(report.lessons_added, vec!["L-0002"]);
        assert_eq!(report.steps_recorded, vec!["hf-0000001"]);
        assert_eq!(report.completions.len(), 1);
        assert_eq!(report.completions[0].to, Status::Completed);
        assert!(report.rejected.is_empty());

        let handoffs = store.load_handoffs().unwrap();
        assert_eq!(handoffs[0].status, Status::Completed);
        assert_eq!(handoffs[0].tried.len(), 1);
        assert_eq!(handoffs[0].tried[0].outcome, Outcome::Success);
        assert!(handoffs[0].linked_sessions.contains("sess-1"));
    }

    #[test]
    fn test_stop_rejects_unknown_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        let config = test_config(dir.path());
        seeded_store(&config, &root);

        let mut ev = event("stop", &root, "sess-1");
        ev.output = Some("HANDOFF: hf-9999999 done\n".to_string());

        let report = run_stop(&config, &ev);
        assert!(report.completions.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].contains("hf-9999999"));
    }

    #[test]
    fn test_stop_rejects_completing_completed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        let config = test_config(dir.path());
        let store = seeded_store(&config, &root);

        let mut handoffs = store.load_handoffs().unwrap();
        lifecycle::transition(&mut handoffs[0], Status::Completed, Utc::now()).unwrap();
        store.save_handoffs(&handoffs).unwrap();

        let mut ev = event("stop", &root, "sess-1");
        ev.output = Some("HANDOFF: hf-0000001 done\n".to_string());

        let report = run_stop(&config, &ev);
        assert!(report.completions.is_empty());
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_stop_without_output_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let ev = event("stop", dir.path(), "sess-1");
        let report = run_stop(&config, &ev);
        assert!(report.lessons_added.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_dispatch_unknown_event_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let ev = event("mystery", dir.path(), "sess-1");
        assert_eq!(dispatch(&config, &ev), serde_json::Value::Null);
    }
}
