//! `lore add` command
//!
//! Records a new lesson.
//!
//! # Usage
//! ```bash
//! lore add "Prefer staged config migrations" --body "Flip the flag first."
//! lore add "tokio drops tasks on exit" -b "Hold the handles." --category gotcha --level system
//! ```

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use crate::config::Config;
use crate::core::lesson::{Category, Lesson, LessonSource, Level};

use super::utils::open_store;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Lesson title
    pub title: String,

    /// Lesson body (markdown)
    #[arg(short, long)]
    pub body: String,

    /// Scope: system or project
    #[arg(long, default_value = "project")]
    pub level: Level,

    /// Category: pattern, gotcha, workflow, tooling, testing, architecture
    #[arg(short, long, default_value = "pattern")]
    pub category: Category,
}

pub fn run(args: AddArgs) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let lesson = store.append_lesson(args.level, |id| {
        Lesson::new(id, args.title.clone(), args.body.clone(), Utc::now().date_naive())
            .with_level(args.level)
            .with_category(args.category)
            .with_source(LessonSource::Human)
    })?;

    println!("✅ Lesson recorded: {}", lesson.lore_id());
    println!("   Level:    {}", lesson.level);
    println!("   Category: {}", lesson.category);

    Ok(())
}
