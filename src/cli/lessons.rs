//! `lore lessons` command
//!
//! Lists lessons ranked the same way injection ranks them, and records
//! confirmed reuse (which is what moves a lesson's rating).
//!
//! # Usage
//! ```bash
//! lore lessons
//! lore lessons --query "config loader"
//! lore lessons use L-0003      # confirm the lesson was applied
//! lore lessons demote L-0003   # explicit rating decrease
//! ```

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Config;
use crate::core::codec::encode_bar;
use crate::core::flow::compute_lesson_counts;
use crate::core::lesson::{Lesson, Level};
use crate::core::score::{RelevanceScorer, ScoreConfig};
use crate::core::store::RecordStore;

use super::utils::open_store;

#[derive(Args, Debug)]
pub struct LessonsArgs {
    #[command(subcommand)]
    pub command: Option<LessonsCommand>,

    /// Rank against this query
    #[arg(short, long)]
    pub query: Option<String>,

    /// Maximum number of lessons to show
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum LessonsCommand {
    /// Confirm a lesson was applied (bumps uses, rating, velocity)
    Use { id: String },
    /// Explicitly lower a lesson's rating
    Demote { id: String },
}

pub fn run(args: LessonsArgs) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    match args.command {
        Some(LessonsCommand::Use { id }) => confirm_use(&store, &id),
        Some(LessonsCommand::Demote { id }) => demote(&store, &id),
        None => list(&config, &store, &args),
    }
}

fn parse_id(id: &str) -> Result<u64> {
    match id.strip_prefix("L-").and_then(|n| n.parse().ok()) {
        Some(n) => Ok(n),
        None => bail!("Invalid lesson id: {} (expected L-<number>)", id),
    }
}

/// Find a lesson in the project scope first, then the system scope
fn with_lesson(
    store: &RecordStore,
    id: &str,
    apply: impl Fn(&mut Lesson),
) -> Result<Lesson> {
    let numeric = parse_id(id)?;

    for level in [Level::Project, Level::System] {
        let mut lessons = store.load_lessons(level)?;
        if let Some(lesson) = lessons.iter_mut().find(|l| l.id == numeric) {
            apply(lesson);
            let updated = lesson.clone();
            store.save_lessons(level, &lessons)?;
            return Ok(updated);
        }
    }
    bail!("Lesson not found: {}", id);
}

fn confirm_use(store: &RecordStore, id: &str) -> Result<()> {
    let lesson = with_lesson(store, id, |lesson| {
        lesson.record_use(Utc::now().date_naive());
    })?;
    println!(
        "✅ {} confirmed ({} uses, rating {})",
        lesson.lore_id(),
        lesson.uses,
        encode_bar(lesson.rating)
    );
    Ok(())
}

fn demote(store: &RecordStore, id: &str) -> Result<()> {
    let lesson = with_lesson(store, id, Lesson::demote)?;
    println!("✅ {} demoted to {}", lesson.lore_id(), encode_bar(lesson.rating));
    Ok(())
}

fn list(config: &Config, store: &RecordStore, args: &LessonsArgs) -> Result<()> {
    let lessons = store.load_all_lessons()?;
    let scorer = RelevanceScorer::with_config(ScoreConfig {
        max_query_len: config.inject.max_query_len,
        ..ScoreConfig::default()
    });
    let ranked = scorer.rank(&lessons, args.query.as_deref(), Utc::now().date_naive());

    if args.json {
        let entries: Vec<serde_json::Value> = ranked
            .iter()
            .take(args.limit)
            .map(|entry| {
                serde_json::json!({
                    "id": entry.lesson.lore_id(),
                    "title": entry.lesson.title,
                    "level": entry.lesson.level,
                    "category": entry.lesson.category,
                    "rating": entry.lesson.rating,
                    "uses": entry.lesson.uses,
                    "score": entry.score,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let counts = compute_lesson_counts(&lessons);
    println!(
        "📚 {} lessons ({} system, {} project)\n",
        counts.total, counts.system, counts.project
    );

    for entry in ranked.iter().take(args.limit) {
        let lesson = &entry.lesson;
        println!(
            "  {} {} {}  {}",
            lesson.lore_id().cyan(),
            encode_bar(lesson.rating).yellow(),
            format!("({})", lesson.category).dimmed(),
            lesson.title
        );
    }

    Ok(())
}
