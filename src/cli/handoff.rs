//! `lore handoff` command
//!
//! Creates handoffs and drives them through the lifecycle.
//!
//! # Usage
//! ```bash
//! lore handoff new "Migrate config loader" --description "Old loader panics."
//! lore handoff start hf-0000001
//! lore handoff block hf-0000001
//! lore handoff step hf-0000001 --outcome fail "bumped toml in place"
//! lore handoff complete hf-0000001
//! lore handoff archive hf-0000001
//! lore handoff list
//! ```

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Config;
use crate::core::handoff::{Handoff, Outcome, Phase, Status};
use crate::core::lifecycle;
use crate::core::store::RecordStore;

use super::utils::open_store;

#[derive(Args, Debug)]
pub struct HandoffArgs {
    #[command(subcommand)]
    pub command: HandoffCommand,
}

#[derive(Subcommand, Debug)]
pub enum HandoffCommand {
    /// Create a new handoff
    New {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Files involved (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        files: Vec<String>,
        /// Assigned agent label
        #[arg(long)]
        agent: Option<String>,
    },
    /// Begin work (not_started -> in_progress)
    Start { id: String },
    /// Raise a blocker (in_progress -> blocked)
    Block { id: String },
    /// Clear the blocker (blocked -> in_progress)
    Unblock { id: String },
    /// Present for review (in_progress -> ready_for_review)
    Review { id: String },
    /// Review requested changes (ready_for_review -> in_progress)
    Reopen { id: String },
    /// Finish the work (-> completed)
    Complete { id: String },
    /// Archive a completed handoff
    Archive { id: String },
    /// Append a tried step
    Step {
        id: String,
        description: String,
        #[arg(short, long, default_value = "partial")]
        outcome: Outcome,
    },
    /// Set the current phase
    Phase { id: String, phase: Phase },
    /// Set the next action
    Next { id: String, next: String },
    /// List handoffs
    List {
        /// Include completed and archived handoffs
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(args: HandoffArgs) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let now = Utc::now();

    match args.command {
        HandoffCommand::New { title, description, files, agent } => {
            let handoff = store.append_handoff(|id| {
                let mut h = Handoff::new(id, title.clone(), now)
                    .with_description(description.clone())
                    .with_files(files.clone());
                h.agent = agent.clone();
                h
            })?;
            println!("✅ Handoff created: {}", handoff.id);
        }
        HandoffCommand::Start { id } => transition(&store, &id, Status::InProgress)?,
        HandoffCommand::Block { id } => transition(&store, &id, Status::Blocked)?,
        HandoffCommand::Unblock { id } => transition(&store, &id, Status::InProgress)?,
        HandoffCommand::Review { id } => transition(&store, &id, Status::ReadyForReview)?,
        HandoffCommand::Reopen { id } => transition(&store, &id, Status::InProgress)?,
        HandoffCommand::Complete { id } => transition(&store, &id, Status::Completed)?,
        HandoffCommand::Archive { id } => {
            with_handoff(&store, &id, |handoff| {
                lifecycle::archive(handoff, now)?;
                Ok(())
            })?;
            println!("✅ {} archived", id);
        }
        HandoffCommand::Step { id, description, outcome } => {
            with_handoff(&store, &id, |handoff| {
                lifecycle::record_step(handoff, description.clone(), outcome, now)?;
                Ok(())
            })?;
            println!("✅ {} step recorded ({})", id, outcome);
        }
        HandoffCommand::Phase { id, phase } => {
            with_handoff(&store, &id, |handoff| {
                if handoff.archived || handoff.status == Status::Completed {
                    bail!("{} is finished and immutable", handoff.id);
                }
                handoff.phase = phase;
                handoff.updated_at = now;
                Ok(())
            })?;
            println!("✅ {} phase set to {}", id, phase);
        }
        HandoffCommand::Next { id, next } => {
            with_handoff(&store, &id, |handoff| {
                if handoff.archived || handoff.status == Status::Completed {
                    bail!("{} is finished and immutable", handoff.id);
                }
                handoff.next = next.clone();
                handoff.updated_at = now;
                Ok(())
            })?;
            println!("✅ {} next action updated", id);
        }
        HandoffCommand::List { all, json } => list(&store, all, json)?,
    }

    Ok(())
}

/// Load, apply a lifecycle transition, save, report
fn transition(store: &RecordStore, id: &str, to: Status) -> Result<()> {
    let report = with_handoff(store, id, |handoff| {
        Ok(lifecycle::transition(handoff, to, Utc::now())?)
    })?;
    println!("✅ {} {} -> {}", report.id, report.from, report.to);
    Ok(())
}

fn with_handoff<R>(
    store: &RecordStore,
    id: &str,
    apply: impl FnOnce(&mut Handoff) -> Result<R>,
) -> Result<R> {
    let mut handoffs = store.load_handoffs()?;
    let Some(handoff) = handoffs.iter_mut().find(|h| h.id == id) else {
        bail!("Handoff not found: {}", id);
    };
    let result = apply(handoff)?;
    store.save_handoffs(&[handoff.clone()])?;
    Ok(result)
}

fn list(store: &RecordStore, all: bool, json: bool) -> Result<()> {
    let handoffs = store.load_handoffs()?;
    let shown: Vec<&Handoff> = handoffs
        .iter()
        .filter(|h| all || (h.is_active() && !h.archived))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No open handoffs.");
        return Ok(());
    }

    for handoff in shown {
        let status = match handoff.status {
            Status::Blocked => handoff.status.to_string().red().to_string(),
            Status::Completed => handoff.status.to_string().green().to_string(),
            _ => handoff.status.to_string().cyan().to_string(),
        };
        println!(
            "  {} [{}/{}] {}",
            handoff.id.cyan(),
            status,
            handoff.phase,
            handoff.title
        );
        if !handoff.next.is_empty() {
            println!("      next: {}", handoff.next.dimmed());
        }
    }

    Ok(())
}
