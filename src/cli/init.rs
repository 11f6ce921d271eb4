//! `lore init` command
//!
//! Creates the .lore project-data directory with empty record files.

use anyhow::Result;
use clap::Args;

use crate::core::codec::{HANDOFFS_HEADER, LESSONS_HEADER};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(long)]
    pub dir: Option<std::path::PathBuf>,
}

pub fn run(args: InitArgs) -> Result<()> {
    let root = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let data_dir = root.join(".lore");

    if data_dir.exists() {
        println!("✅ Already initialized: {}", data_dir.display());
        return Ok(());
    }

    std::fs::create_dir_all(&data_dir)?;
    std::fs::write(data_dir.join("lessons.md"), format!("{}\n", LESSONS_HEADER))?;
    std::fs::write(data_dir.join("handoffs.md"), format!("{}\n", HANDOFFS_HEADER))?;

    println!("✅ Initialized lore store: {}", data_dir.display());
    println!("   lessons:  {}", data_dir.join("lessons.md").display());
    println!("   handoffs: {}", data_dir.join("handoffs.md").display());

    Ok(())
}
