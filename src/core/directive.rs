//! Directive parsing
//!
//! Assistants record knowledge by emitting command lines in their output:
//!
//! ```text
//! LESSON: Prefer staged migrations :: Flip the flag first, clean up later.
//! LESSON: [gotcha] tokio drops spawned tasks on runtime exit :: Hold the handles.
//! HANDOFF: hf-0000012 tried(fail): bumped toml in place
//! HANDOFF: hf-0000012 done
//! ```
//!
//! One directive per line. A malformed payload is skipped with a debug log,
//! never partially applied.

use tracing::debug;

use super::handoff::Outcome;
use super::lesson::Category;

const LESSON_PREFIX: &str = "LESSON:";
const HANDOFF_PREFIX: &str = "HANDOFF:";

/// One parsed directive from assistant output
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    NewLesson {
        title: String,
        body: String,
        category: Option<Category>,
    },
    NewHandoffStep {
        id: String,
        description: String,
        outcome: Outcome,
    },
    CompleteHandoff {
        id: String,
    },
}

/// Scan assistant output for directives, in order of appearance
pub fn parse_directives(text: &str) -> Vec<Directive> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Directive> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(LESSON_PREFIX) {
        return parse_lesson_directive(rest.trim()).or_else(|| {
            debug!(line, "malformed LESSON directive skipped");
            None
        });
    }
    if let Some(rest) = line.strip_prefix(HANDOFF_PREFIX) {
        return parse_handoff_directive(rest.trim()).or_else(|| {
            debug!(line, "malformed HANDOFF directive skipped");
            None
        });
    }
    None
}

/// `[category] title :: body` with the category tag optional
fn parse_lesson_directive(rest: &str) -> Option<Directive> {
    let (category, rest) = match rest.strip_prefix('[') {
        Some(tagged) => {
            let (tag, remainder) = tagged.split_once(']')?;
            (Some(tag.trim().parse::<Category>().ok()?), remainder.trim_start())
        }
        None => (None, rest),
    };

    let (title, body) = rest.split_once("::")?;
    let title = title.trim();
    let body = body.trim();
    if title.is_empty() || body.is_empty() {
        return None;
    }

    Some(Directive::NewLesson {
        title: title.to_string(),
        body: body.to_string(),
        category,
    })
}

/// `<id> tried(<outcome>): <description>` or `<id> done`
fn parse_handoff_directive(rest: &str) -> Option<Directive> {
    let (id, action) = rest.split_once(char::is_whitespace)?;
    if !id.starts_with("hf-") {
        return None;
    }
    let action = action.trim();

    if action == "done" {
        return Some(Directive::CompleteHandoff { id: id.to_string() });
    }

    let payload = action.strip_prefix("tried(")?;
    let (outcome, description) = payload.split_once("):")?;
    let outcome: Outcome = outcome.trim().parse().ok()?;
    let description = description.trim();
    if description.is_empty() {
        return None;
    }

    Some(Directive::NewHandoffStep {
        id: id.to_string(),
        description: description.to_string(),
        outcome,
    })
}
