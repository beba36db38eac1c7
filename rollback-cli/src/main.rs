use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

use commands::{add, init, revert, status, track};
use rollback_workspace::DEFAULT_CHANGE_LIST;

#[derive(Parser)]
#[command(name = "rollback")]
#[command(version, about = "Revert pending changes across version-control backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a rollback workspace in a directory
    Init {
        /// Workspace root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Snapshot files as the baseline to revert to
    Track {
        /// Files to track
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Change list to place the files in
        #[arg(short, long, default_value = DEFAULT_CHANGE_LIST)]
        list: String,
    },

    /// Record files as newly added
    Add {
        /// Files or directories to record
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Change list to place the files in
        #[arg(short, long, default_value = DEFAULT_CHANGE_LIST)]
        list: String,
    },

    /// Show pending changes
    Status {
        /// Print pending changes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Revert pending changes
    Revert(revert::RevertArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            init::run(path)?;
        }
        Commands::Track { paths, list } => {
            track::run(paths, list)?;
        }
        Commands::Add { paths, list } => {
            add::run(paths, list)?;
        }
        Commands::Status { json } => {
            status::run(json)?;
        }
        Commands::Revert(args) => {
            revert::run(args).await?;
        }
    }

    Ok(())
}
