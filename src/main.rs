//! lore CLI - Entry point
//!
//! Usage: lore <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lore::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init(args) => lore::cli::init::run(args),
        Commands::Add(args) => lore::cli::add::run(args),
        Commands::Lessons(args) => lore::cli::lessons::run(args),
        Commands::Handoff(args) => lore::cli::handoff::run(args),
        Commands::Stats(args) => lore::cli::stats::run(args),
        Commands::Config(args) => lore::cli::config::run(args),
        Commands::Hook(args) => lore::cli::hook::run(args),
    }
}

/// Initialize tracing; RUST_LOG wins, then the config debug level
fn init_tracing(verbose: bool) {
    let debug_level = lore::config::Config::load()
        .map(|c| c.core.debug)
        .unwrap_or(0);

    let default_filter = if verbose || debug_level >= 2 {
        "lore=trace"
    } else if debug_level == 1 {
        "lore=debug"
    } else {
        "lore=warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
