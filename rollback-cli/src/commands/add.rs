use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub fn run(paths: Vec<PathBuf>, list: String) -> Result<()> {
    let workspace = super::open_workspace()?;

    let added = super::record_each(&paths, "+".green(), "added", |path| workspace.add(path, &list));
    workspace.close();
    let added = added?;

    println!();
    println!("Added {} file(s) to {}", added.to_string().yellow(), list.cyan());

    Ok(())
}
