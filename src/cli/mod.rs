//! CLI module - Command definitions and handlers

use clap::{Parser, Subcommand};

pub mod add;
pub mod config;
pub mod handoff;
pub mod hook;
pub mod init;
pub mod lessons;
pub mod stats;
pub mod utils;

/// lore - session knowledge retention for AI coding assistants
///
/// Lessons and handoffs persisted as markdown, injected back into new
/// sessions by lifecycle hooks.
#[derive(Parser, Debug)]
#[command(name = "lore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a .lore data directory for this project
    Init(init::InitArgs),

    /// Add a new lesson
    Add(add::AddArgs),

    /// List lessons, ranked by relevance
    Lessons(lessons::LessonsArgs),

    /// Create and drive handoffs through their lifecycle
    Handoff(handoff::HandoffArgs),

    /// Flow analytics over the handoff pipeline
    Stats(stats::StatsArgs),

    /// Get or set configuration
    Config(config::ConfigArgs),

    /// Handle a host hook event (reads JSON on stdin)
    Hook(hook::HookArgs),
}
