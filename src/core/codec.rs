//! Markdown codec - the persistence layer
//!
//! Lessons and handoffs live in plain markdown files, one file per record
//! type per scope. This module is the only place that knows the format;
//! all drift tolerance (unknown header fields, lenient values) is here.
//!
//! # Format
//! ```markdown
//! # Lessons
//!
//! ## L-0003 · Prefer staged config migrations
//! level: project | category: pattern | rating: [#######---] | uses: 7 | velocity: 1.50 | learned: 2026-01-03 | last_used: 2026-02-11 | source: ai
//! body line(s)...
//! ```
//!
//! A malformed record is skipped and reported, never aborts the file.
//! Unknown metadata keys round-trip verbatim, in order.

use chrono::{DateTime, NaiveDate, Utc};

use super::handoff::{Handoff, Outcome, TriedStep};
use super::lesson::{clamp_rating, Lesson, LessonSource, RATING_MAX};
use super::{LoreError, Result};

pub const LESSONS_HEADER: &str = "# Lessons";
pub const HANDOFFS_HEADER: &str = "# Handoffs";

const BAR_SLOTS: usize = 10;
const DATE_FMT: &str = "%Y-%m-%d";

/// One record that failed to parse and was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based line of the offending `## ` header
    pub line: usize,
    pub reason: String,
}

/// Result of parsing one document: the good records plus a skip report
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRecord>,
}

/// Encode a rating as the fixed-width bracketed bar
///
/// Ten slots, two segments each: `#` = 1.0, `+` = 0.5, `-` = empty.
pub fn encode_bar(rating: f32) -> String {
    let rating = clamp_rating(rating);
    let full = rating.floor() as usize;
    let half = rating - full as f32 >= 0.49;
    let mut bar = String::with_capacity(BAR_SLOTS + 2);
    bar.push('[');
    for slot in 0..BAR_SLOTS {
        if slot < full {
            bar.push('#');
        } else if slot == full && half {
            bar.push('+');
        } else {
            bar.push('-');
        }
    }
    bar.push(']');
    bar
}

/// Decode a rating bar; lossless inverse of `encode_bar` at half-unit steps
pub fn decode_bar(bar: &str) -> Option<f32> {
    let inner = bar.strip_prefix('[')?.strip_suffix(']')?;
    if inner.chars().count() != BAR_SLOTS {
        return None;
    }
    let mut rating = 0.0f32;
    for c in inner.chars() {
        match c {
            '#' => rating += 1.0,
            '+' => rating += 0.5,
            '-' => {}
            _ => return None,
        }
    }
    (rating <= RATING_MAX).then_some(rating)
}

// ─── documents ───

/// Parse a lessons document; skips and reports malformed records
pub fn parse_lessons(text: &str) -> Result<ParseOutcome<Lesson>> {
    parse_document(text, LESSONS_HEADER, parse_lesson_block)
}

/// Parse a handoffs document; skips and reports malformed records
pub fn parse_handoffs(text: &str) -> Result<ParseOutcome<Handoff>> {
    parse_document(text, HANDOFFS_HEADER, parse_handoff_block)
}

pub fn format_lessons(lessons: &[Lesson]) -> String {
    let mut out = String::from(LESSONS_HEADER);
    out.push('\n');
    for lesson in lessons {
        out.push('\n');
        out.push_str(&lesson_block(lesson));
    }
    out
}

pub fn format_handoffs(handoffs: &[Handoff]) -> String {
    let mut out = String::from(HANDOFFS_HEADER);
    out.push('\n');
    for handoff in handoffs {
        out.push('\n');
        out.push_str(&handoff_block(handoff));
    }
    out
}

/// One raw record block: the `## ` header plus its following lines
struct RawBlock<'a> {
    line: usize,
    header: &'a str,
    body: Vec<&'a str>,
}

fn parse_document<T>(
    text: &str,
    doc_header: &str,
    parse_block: fn(&RawBlock) -> std::result::Result<T, String>,
) -> Result<ParseOutcome<T>> {
    let mut outcome = ParseOutcome {
        records: Vec::new(),
        skipped: Vec::new(),
    };

    // An empty or missing file is an empty collection, not an error
    if text.trim().is_empty() {
        return Ok(outcome);
    }

    let mut lines = text.lines().enumerate().peekable();

    // First non-blank line must be the document header
    let header_line = loop {
        match lines.next() {
            Some((_, l)) if l.trim().is_empty() => continue,
            Some((n, l)) => break (n, l),
            None => return Ok(outcome),
        }
    };
    if header_line.1.trim() != doc_header {
        return Err(LoreError::Parse {
            line: header_line.0 + 1,
            reason: format!("expected document header '{}'", doc_header),
        });
    }

    let mut blocks: Vec<RawBlock> = Vec::new();
    for (n, line) in lines {
        if let Some(rest) = line.strip_prefix("## ") {
            blocks.push(RawBlock {
                line: n + 1,
                header: rest,
                body: Vec::new(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.body.push(line);
        } else if !line.trim().is_empty() {
            // Content before the first record header is not a record
            outcome.skipped.push(SkippedRecord {
                line: n + 1,
                reason: "content outside any record".to_string(),
            });
        }
    }

    for block in &blocks {
        match parse_block(block) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => outcome.skipped.push(SkippedRecord {
                line: block.line,
                reason,
            }),
        }
    }

    Ok(outcome)
}

/// Split `## <id> · <title>` into its parts
fn split_header(header: &str) -> std::result::Result<(&str, &str), String> {
    header
        .split_once(" · ")
        .map(|(id, title)| (id.trim(), title.trim()))
        .ok_or_else(|| "malformed record header (missing ' · ' separator)".to_string())
}

/// Split the `key: value | key: value` metadata line
fn split_meta(line: &str) -> Vec<(&str, &str)> {
    line.split(" | ")
        .filter_map(|field| field.split_once(": "))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

// ─── lessons ───

fn parse_lesson_block(block: &RawBlock) -> std::result::Result<Lesson, String> {
    let (id_str, title) = split_header(block.header)?;
    let id: u64 = id_str
        .strip_prefix("L-")
        .ok_or_else(|| format!("lesson id '{}' missing L- prefix", id_str))?
        .parse()
        .map_err(|_| format!("lesson id '{}' is not numeric", id_str))?;

    let mut body_lines = block.body.iter();
    let meta_line = body_lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "lesson record has no metadata line".to_string())?;

    let mut lesson = Lesson::new(id, title, "", NaiveDate::default());
    let mut source_tag = "ai".to_string();
    let mut model = None;
    let mut session = None;
    let mut learned = None;
    let mut last_used = None;

    for (key, value) in split_meta(meta_line) {
        match key {
            "level" => lesson.level = value.parse().map_err(|e| format!("{}", e))?,
            "category" => lesson.category = value.parse().map_err(|e| format!("{}", e))?,
            "rating" => {
                lesson.rating =
                    decode_bar(value).ok_or_else(|| format!("bad rating bar '{}'", value))?
            }
            "uses" => lesson.uses = value.parse().map_err(|_| format!("bad uses '{}'", value))?,
            "velocity" => {
                lesson.velocity = value.parse().map_err(|_| format!("bad velocity '{}'", value))?
            }
            "learned" => learned = Some(parse_date(value)?),
            "last_used" => last_used = Some(parse_date(value)?),
            "source" => source_tag = value.to_string(),
            "model" => model = Some(value.to_string()),
            "session" => session = Some(value.to_string()),
            // Forward/backward drift: keep what we do not understand
            _ => lesson.extra.push((key.to_string(), value.to_string())),
        }
    }

    lesson.learned_at = learned.ok_or_else(|| "missing learned date".to_string())?;
    // Tolerate drifted files rather than reject: last_used never precedes learned
    lesson.last_used_at = last_used.unwrap_or(lesson.learned_at).max(lesson.learned_at);
    lesson.source = match source_tag.as_str() {
        "human" => LessonSource::Human,
        "ai" => LessonSource::Ai { model, session },
        other => return Err(format!("unknown source '{}'", other)),
    };

    lesson.body = collect_text(body_lines.as_slice());
    Ok(lesson)
}

/// One lesson as its markdown block (header, metadata, body)
pub fn lesson_block(lesson: &Lesson) -> String {
    let mut meta = format!(
        "level: {} | category: {} | rating: {} | uses: {} | velocity: {:.2} | learned: {} | last_used: {} | source: {}",
        lesson.level,
        lesson.category,
        encode_bar(lesson.rating),
        lesson.uses,
        lesson.velocity,
        lesson.learned_at.format(DATE_FMT),
        lesson.last_used_at.format(DATE_FMT),
        lesson.source.tag(),
    );
    if let LessonSource::Ai { model, session } = &lesson.source {
        if let Some(model) = model {
            meta.push_str(&format!(" | model: {}", model));
        }
        if let Some(session) = session {
            meta.push_str(&format!(" | session: {}", session));
        }
    }
    for (key, value) in &lesson.extra {
        meta.push_str(&format!(" | {}: {}", key, value));
    }

    let mut block = format!("## {} · {}\n{}\n", lesson.lore_id(), lesson.title, meta);
    if !lesson.body.is_empty() {
        block.push_str(&lesson.body);
        block.push('\n');
    }
    block
}

// ─── handoffs ───

fn parse_handoff_block(block: &RawBlock) -> std::result::Result<Handoff, String> {
    let (id, title) = split_header(block.header)?;
    if !id.starts_with("hf-") {
        return Err(format!("handoff id '{}' missing hf- prefix", id));
    }

    let mut body_lines = block.body.iter().peekable();
    let meta_line = loop {
        match body_lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => break *l,
            None => return Err("handoff record has no metadata line".to_string()),
        }
    };

    let mut handoff = Handoff::new(id, title, DateTime::<Utc>::default());
    let mut created = None;
    let mut updated = None;

    for (key, value) in split_meta(meta_line) {
        match key {
            "status" => handoff.status = value.parse().map_err(|e| format!("{}", e))?,
            "phase" => handoff.phase = value.parse().map_err(|e| format!("{}", e))?,
            "created" => created = Some(parse_ts(value)?),
            "updated" => updated = Some(parse_ts(value)?),
            "agent" => handoff.agent = Some(value.to_string()),
            "archived" => {
                handoff.archived =
                    value.parse().map_err(|_| format!("bad archived '{}'", value))?
            }
            _ => handoff.extra.push((key.to_string(), value.to_string())),
        }
    }

    handoff.created_at = created.ok_or_else(|| "missing created timestamp".to_string())?;
    // updated_at never precedes created_at, even in drifted files
    handoff.updated_at = updated.unwrap_or(handoff.created_at).max(handoff.created_at);

    // Labeled sections, then free description
    let mut description = Vec::new();
    while let Some(line) = body_lines.next() {
        if let Some(rest) = line.strip_prefix("files: ") {
            handoff.files = split_list(rest);
        } else if let Some(rest) = line.strip_prefix("sessions: ") {
            handoff.linked_sessions = split_list(rest).into_iter().collect();
        } else if line.trim() == "tried:" {
            while let Some(step_line) = body_lines.peek() {
                match parse_tried_step(step_line) {
                    Some(step) => {
                        handoff.tried.push(step);
                        body_lines.next();
                    }
                    None => break,
                }
            }
        } else if let Some(rest) = line.strip_prefix("next: ") {
            handoff.next = rest.trim().to_string();
        } else {
            description.push(*line);
            break;
        }
    }
    description.extend(body_lines.copied());
    handoff.description = collect_text(&description);

    Ok(handoff)
}

/// One handoff as its markdown block
pub fn handoff_block(handoff: &Handoff) -> String {
    let mut meta = format!(
        "status: {} | phase: {} | created: {} | updated: {}",
        handoff.status,
        handoff.phase,
        format_ts(handoff.created_at),
        format_ts(handoff.updated_at),
    );
    if let Some(agent) = &handoff.agent {
        meta.push_str(&format!(" | agent: {}", agent));
    }
    if handoff.archived {
        meta.push_str(" | archived: true");
    }
    for (key, value) in &handoff.extra {
        meta.push_str(&format!(" | {}: {}", key, value));
    }

    let mut block = format!("## {} · {}\n{}\n", handoff.id, handoff.title, meta);
    if !handoff.files.is_empty() {
        block.push_str(&format!("files: {}\n", handoff.files.join(", ")));
    }
    if !handoff.linked_sessions.is_empty() {
        let sessions: Vec<&str> = handoff.linked_sessions.iter().map(String::as_str).collect();
        block.push_str(&format!("sessions: {}\n", sessions.join(", ")));
    }
    if !handoff.tried.is_empty() {
        block.push_str("tried:\n");
        for step in &handoff.tried {
            block.push_str(&format!("- [{}] {}\n", step.outcome, step.description));
        }
    }
    if !handoff.next.is_empty() {
        block.push_str(&format!("next: {}\n", handoff.next));
    }
    if !handoff.description.is_empty() {
        block.push_str(&handoff.description);
        block.push('\n');
    }
    block
}

// ─── helpers ───

fn parse_tried_step(line: &str) -> Option<TriedStep> {
    let rest = line.strip_prefix("- [")?;
    let (outcome, description) = rest.split_once("] ")?;
    Some(TriedStep {
        outcome: outcome.parse::<Outcome>().ok()?,
        description: description.trim().to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|_| format!("bad date '{}'", value))
}

fn parse_ts(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("bad timestamp '{}'", value))
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Join record body lines, trimming surrounding blank lines
fn collect_text(lines: &[&str]) -> String {
    let text: Vec<&str> = lines.to_vec();
    let start = text.iter().position(|l| !l.trim().is_empty());
    let end = text.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => text[s..=e].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handoff::{Phase, Status};
    use crate::core::lesson::{Category, Level};

    fn sample_lesson() -> Lesson {
        let mut lesson = Lesson::new(
            3,
            "Prefer staged config migrations",
            "Flip the flag first, remove the old path a release later.",
            "2026-01-03".parse().unwrap(),
        )
        .with_level(Level::Project)
        .with_category(Category::Pattern)
        .with_source(LessonSource::Ai {
            model: Some("claude-x".to_string()),
            session: Some("sess-9".to_string()),
        });
        lesson.rating = 6.5;
        lesson.uses = 7;
        lesson.velocity = 1.5;
        lesson.last_used_at = "2026-02-11".parse().unwrap();
        lesson
    }

    fn sample_handoff() -> Handoff {
        let mut handoff = Handoff::new(
            "hf-0000012",
            "Migrate config loader",
            "2026-02-01T10:00:00Z".parse().unwrap(),
        )
        .with_description("Old loader panics on missing keys.")
        .with_files(vec!["src/config.rs".to_string(), "src/main.rs".to_string()])
        .with_agent("refactor-bot");
        handoff.status = Status::InProgress;
        handoff.phase = Phase::Implementing;
        handoff.updated_at = "2026-02-03T12:00:00Z".parse().unwrap();
        handoff.tried = vec![
            TriedStep {
                description: "bumped toml in place".to_string(),
                outcome: Outcome::Fail,
            },
            TriedStep {
                description: "staged behind a flag".to_string(),
                outcome: Outcome::Success,
            },
        ];
        handoff.next = "wire the loader into main".to_string();
        handoff.linked_sessions = ["sess-abc", "sess-def"].iter().map(|s| s.to_string()).collect();
        handoff
    }

    #[test]
    fn test_encode_bar() {
        assert_eq!(encode_bar(0.0), "[----------]");
        assert_eq!(encode_bar(6.5), "[######+---]");
        assert_eq!(encode_bar(10.0), "[##########]");
        assert_eq!(encode_bar(0.5), "[+---------]");
    }

    #[test]
    fn test_bar_round_trip_all_half_steps() {
        let mut rating = 0.0f32;
        while rating <= RATING_MAX {
            assert_eq!(decode_bar(&encode_bar(rating)), Some(rating));
            rating += RATING_STEP_FOR_TEST;
        }
    }

    const RATING_STEP_FOR_TEST: f32 = 0.5;

    #[test]
    fn test_decode_bar_rejects_garbage() {
        assert_eq!(decode_bar("[#########]"), None); // 9 slots
        assert_eq!(decode_bar("##########"), None); // no brackets
        assert_eq!(decode_bar("[#####*----]"), None); // bad glyph
    }

    #[test]
    fn test_lesson_round_trip() {
        let original = vec![sample_lesson()];
        let text = format_lessons(&original);
        let parsed = parse_lessons(&text).unwrap();
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.records, original);
    }

    #[test]
    fn test_handoff_round_trip() {
        let original = vec![sample_handoff()];
        let text = format_handoffs(&original);
        let parsed = parse_handoffs(&text).unwrap();
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.records, original);
    }

    #[test]
    fn test_parse_format_parse_is_stable() {
        let text = format_lessons(&[sample_lesson()]);
        let once = parse_lessons(&text).unwrap().records;
        let twice = parse_lessons(&format_lessons(&once)).unwrap().records;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_fields_preserved_verbatim() {
        let text = "# Lessons\n\n\
            ## L-0001 · Title\n\
            level: project | category: gotcha | rating: [##--------] | uses: 1 | velocity: 0.00 | learned: 2026-01-01 | last_used: 2026-01-02 | source: human | reviewed_by: sam | priority: high\n\
            Body.\n";
        let parsed = parse_lessons(text).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let lesson = &parsed.records[0];
        assert_eq!(
            lesson.extra,
            vec![
                ("reviewed_by".to_string(), "sam".to_string()),
                ("priority".to_string(), "high".to_string()),
            ]
        );

        let formatted = lesson_block(lesson);
        assert!(formatted.contains("reviewed_by: sam | priority: high"));
    }

    #[test]
    fn test_malformed_entry_is_skipped_not_fatal() {
        let text = "# Lessons\n\n\
            ## not a valid header line\n\
            level: project\n\n\
            ## L-0002 · Good record\n\
            level: system | category: tooling | rating: [#---------] | uses: 0 | velocity: 0.00 | learned: 2026-01-01 | last_used: 2026-01-01 | source: human\n";
        let parsed = parse_lessons(text).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id, 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 3);
    }

    #[test]
    fn test_wrong_document_header_is_fatal() {
        let err = parse_lessons("# Handoffs\n").unwrap_err();
        assert!(matches!(err, LoreError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_text_is_empty_collection() {
        let parsed = parse_lessons("").unwrap();
        assert!(parsed.records.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_drifted_dates_are_clamped() {
        let text = "# Lessons\n\n\
            ## L-0001 · T\n\
            level: project | category: pattern | rating: [----------] | uses: 0 | velocity: 0.00 | learned: 2026-02-01 | last_used: 2026-01-01 | source: human\n";
        let parsed = parse_lessons(text).unwrap();
        let lesson = &parsed.records[0];
        assert_eq!(lesson.last_used_at, lesson.learned_at);
    }

    #[test]
    fn test_handoff_sections_optional() {
        let text = "# Handoffs\n\n\
            ## hf-0000001 · Bare minimum\n\
            status: not_started | phase: research | created: 2026-02-01T10:00:00Z | updated: 2026-02-01T10:00:00Z\n";
        let parsed = parse_handoffs(text).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let handoff = &parsed.records[0];
        assert!(handoff.files.is_empty());
        assert!(handoff.tried.is_empty());
        assert!(handoff.description.is_empty());
    }

    #[test]
    fn test_handoff_tried_order_preserved() {
        let handoff = sample_handoff();
        let parsed = parse_handoffs(&format_handoffs(&[handoff.clone()])).unwrap();
        assert_eq!(parsed.records[0].tried, handoff.tried);
    }
}
