//! `lore stats` command - flow analytics over the handoff pipeline

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::config::Config;
use crate::core::flow::{compute_lesson_counts, flow_stats};

use super::utils::open_store;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Blocked-alert threshold in days (default from config)
    #[arg(long)]
    pub blocked_threshold: Option<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Count")]
    count: usize,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let threshold = args
        .blocked_threshold
        .unwrap_or(config.alerts.blocked_threshold_days);

    let handoffs = store.load_handoffs()?;
    let lessons = store.load_all_lessons()?;
    let stats = flow_stats(&handoffs, Utc::now(), threshold);
    let lesson_counts = compute_lesson_counts(&lessons);

    if args.json {
        let json = serde_json::json!({
            "flow": stats,
            "lessons": lesson_counts,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("📊 Handoff Flow\n");
    println!("  Total:      {}", stats.total);
    println!("  Active:     {}", stats.active_count);
    println!("  Blocked:    {}", stats.blocked_count);
    println!("  Completion: {:.0}%", stats.completion_rate * 100.0);
    println!("  Avg cycle:  {:.1} days", stats.avg_cycle_days);
    println!("  Avg age:    {:.1} days", stats.avg_age_days);

    if !stats.by_status.is_empty() {
        let rows: Vec<StatusRow> = stats
            .by_status
            .iter()
            .map(|(status, count)| StatusRow {
                status: status.to_string(),
                count: *count,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("\n{}", table);
    }

    if !stats.by_phase.is_empty() {
        println!("\n🔀 Phases (open work)");
        for (phase, count) in &stats.by_phase {
            println!("  {:14} {}", phase.to_string(), count);
        }
    }

    if !stats.blocked_over_threshold.is_empty() {
        println!("\n⚠️  Blocked over {} days:", threshold);
        for alert in &stats.blocked_over_threshold {
            println!(
                "  {} {} ({} days)",
                alert.id.red(),
                alert.title,
                alert.days_blocked
            );
        }
    }

    println!(
        "\n📚 Lessons: {} ({} system, {} project)",
        lesson_counts.total, lesson_counts.system, lesson_counts.project
    );

    Ok(())
}
