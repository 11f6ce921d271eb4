//! `lore config` command
//!
//! Gets or sets configuration values, preserving file formatting on edit.
//!
//! # Usage
//! ```bash
//! lore config get
//! lore config get alerts.blocked_threshold_days
//! lore config set alerts.blocked_threshold_days 7
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show config, or one value by dotted key
    Get { key: Option<String> },
    /// Set a value by dotted key (section.field)
    Set { key: String, value: String },
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Get { key } => get(key.as_deref()),
        ConfigCommand::Set { key, value } => set(&key, &value),
    }
}

fn config_path() -> std::path::PathBuf {
    Config::find_local_config().unwrap_or_else(Config::global_config_path)
}

fn get(key: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let rendered = toml::to_string_pretty(&config)?;

    match key {
        None => print!("{}", rendered),
        Some(key) => {
            let parsed: toml::Value = toml::from_str(&rendered)?;
            let mut current = &parsed;
            for part in key.split('.') {
                current = match current.get(part) {
                    Some(value) => value,
                    None => bail!("Unknown config key: {}", key),
                };
            }
            println!("{}", current);
        }
    }
    Ok(())
}

/// Edit with toml_edit so comments and layout survive
fn set(key: &str, value: &str) -> Result<()> {
    let path = config_path();
    let text = std::fs::read_to_string(&path).unwrap_or_default();
    let mut doc: toml_edit::DocumentMut = text.parse().context("config file is not valid TOML")?;

    let Some((section, field)) = key.split_once('.') else {
        bail!("Config keys are dotted: section.field (e.g. alerts.blocked_threshold_days)");
    };

    let item: toml_edit::Item = if let Ok(n) = value.parse::<i64>() {
        toml_edit::value(n)
    } else if let Ok(b) = value.parse::<bool>() {
        toml_edit::value(b)
    } else {
        toml_edit::value(value)
    };

    doc.entry(section)
        .or_insert(toml_edit::table())
        .as_table_mut()
        .context("config section is not a table")?
        .insert(field, item);

    // Validate before writing back
    let _: Config = toml::from_str(&doc.to_string()).context("value rejected by config schema")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, doc.to_string())?;

    println!("✅ {} = {}", key, value);
    println!("   {}", path.display());
    Ok(())
}
