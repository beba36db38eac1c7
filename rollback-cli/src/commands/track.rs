use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub fn run(paths: Vec<PathBuf>, list: String) -> Result<()> {
    let workspace = super::open_workspace()?;

    let tracked = super::record_each(&paths, "✓".green(), "tracked", |path| {
        workspace.track(path, &list)
    });
    workspace.close();
    let tracked = tracked?;

    println!();
    println!(
        "Tracking {} file(s) in {}",
        tracked.to_string().yellow(),
        list.cyan()
    );

    Ok(())
}
