use crate::display;
use anyhow::Result;
use colored::Colorize;

pub fn run(json: bool) -> Result<()> {
    let workspace = super::open_workspace()?;
    let pending = workspace.pending_changes()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        workspace.close();
        return Ok(());
    }

    let session = workspace.session();
    println!("{}", "Workspace Status".bold().cyan());
    println!("  {}: {}", "Root".bold(), workspace.root().display());
    println!("  {}: {}", "Session ID".bold(), session.id());
    println!(
        "  {}: {}",
        "Started".bold(),
        session.started().format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    if pending.is_empty() {
        println!("{}", "No pending changes".green());
    } else {
        println!(
            "{} {}",
            "Pending changes:".bold(),
            format!("({})", pending.len()).yellow()
        );

        for list in workspace.change_lists()? {
            let changes: Vec<_> = pending.iter().filter(|p| p.change_list == list).collect();
            if changes.is_empty() {
                continue;
            }

            println!();
            println!("  {}", list.bold());
            for p in changes {
                println!(
                    "    {} {}",
                    display::kind_icon(p.change.kind()),
                    display::describe(workspace.root(), &p.change)
                );
            }
        }

        println!();
        println!("Run {} to revert these changes", "rollback revert".cyan());
    }

    let dirty = workspace.dirty_paths()?;
    if !dirty.is_empty() {
        println!();
        println!(
            "{} {}",
            "Rescanned paths marked dirty by the last revert:".dimmed(),
            dirty.len().to_string().yellow()
        );
        workspace.clear_dirty()?;
    }

    workspace.close();
    Ok(())
}
