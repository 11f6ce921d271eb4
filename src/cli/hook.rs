//! `lore hook` command - host hook entry point
//!
//! Reads the host's JSON event payload on stdin and writes the response
//! payload to stdout. Never fails the host pipeline: any error becomes an
//! empty payload and a log line on stderr.
//!
//! # Usage
//! ```bash
//! echo '{"session_id":"s1","query":"config loader"}' | lore hook session-start
//! echo '{"session_id":"s1","output":"LESSON: t :: b"}' | lore hook stop
//! ```

use std::io::Read;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::config::Config;
use crate::hooks::{dispatch, HookEvent};

#[derive(Args, Debug)]
pub struct HookArgs {
    /// Event name: session-start, tool-use, stop
    pub event: String,

    /// Emit the injectable text instead of the JSON payload
    #[arg(long)]
    pub text: bool,
}

pub fn run(args: HookArgs) -> Result<()> {
    let config = Config::load().unwrap_or_default();

    let mut input = String::new();
    let _ = std::io::stdin().read_to_string(&mut input);

    let mut event: HookEvent = match serde_json::from_str(&input) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "unreadable hook payload, using empty event");
            HookEvent {
                event: String::new(),
                project_root: None,
                session_id: None,
                query: None,
                output: None,
            }
        }
    };
    // The subcommand argument names the event; the payload fills the rest
    event.event = args.event;

    let payload = dispatch(&config, &event);

    if args.text {
        if let Some(text) = payload.get("text").and_then(|t| t.as_str()) {
            if !text.is_empty() {
                println!("{}", text);
            }
        }
    } else {
        println!("{}", serde_json::to_string(&payload)?);
    }

    Ok(())
}
