use anyhow::Result;
use colored::Colorize;
use rollback_workspace::{Workspace, DB_FILE, WORKSPACE_DIR};
use std::path::PathBuf;

pub fn run(path: PathBuf) -> Result<()> {
    let workspace = Workspace::init(&path)?;
    let dir = workspace.root().join(WORKSPACE_DIR);

    println!("{}", "Initialized rollback workspace".bold().cyan());
    println!("   {}: {}", "Root".bold(), workspace.root().display());
    println!("   {}: {}", "Database".bold(), dir.join(DB_FILE).display());
    println!(
        "   {}: {}",
        "Backends".bold(),
        workspace
            .config()
            .enabled_backends()
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
    println!("Run {} to snapshot files", "rollback track <PATHS>".cyan());

    workspace.close();
    Ok(())
}
