use crate::display;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use rollback_core::{
    prepare_request, BackendId, ExecutionMode, Orchestrator, ProgressSink, RollbackOptions,
};
use rollback_workspace::{LocalRefreshQueue, PendingChange, RevertSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Args)]
pub struct RevertArgs {
    /// Only revert changes under these paths
    paths: Vec<PathBuf>,

    /// Only revert changes in this change list
    #[arg(short, long)]
    list: Option<String>,

    /// Delete newly added files once their backend reverted cleanly
    #[arg(long)]
    delete_added: bool,

    /// Refresh and reconcile before returning
    #[arg(long)]
    sync: bool,

    /// Revert backend groups concurrently
    #[arg(long)]
    parallel: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

impl RevertArgs {
    fn options(&self, settings: &RevertSettings) -> RollbackOptions {
        RollbackOptions {
            delete_new_files: self.delete_added || settings.delete_added_files,
            synchronous: self.sync || settings.refresh_synchronously,
            execution: if self.parallel || settings.parallel {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Sequential
            },
        }
    }

    fn selects(&self, pending: &PendingChange, filters: &[PathBuf]) -> bool {
        if let Some(list) = &self.list {
            if &pending.change_list != list {
                return false;
            }
        }
        filters.is_empty()
            || pending
                .change
                .touched_paths()
                .iter()
                .any(|t| filters.iter().any(|f| t.path.starts_with(f)))
    }
}

/// Reports backend groups on a progress bar.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|e| {
                warn!("Failed to create progress bar template: {}", e);
                ProgressStyle::default_bar()
            })
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn run_started(&self, groups: usize) {
        self.bar.set_length(groups as u64);
    }

    fn group_started(&self, backend: &BackendId, changes: usize) {
        self.bar.set_message(format!("{} ({} change(s))", backend, changes));
    }

    fn group_finished(&self, backend: &BackendId, failures: usize) {
        if failures > 0 {
            self.bar
                .println(format!("  {} {}: {} failure(s)", "✗".red(), backend, failures));
        }
        self.bar.inc(1);
    }
}

pub async fn run(args: RevertArgs) -> Result<()> {
    let workspace = super::open_workspace()?;
    let options = args.options(&workspace.config().revert);
    let settle_timeout = Duration::from_secs(workspace.config().revert.settle_timeout_secs);

    let filters = args
        .paths
        .iter()
        .map(|p| workspace.absolute(p))
        .collect::<rollback_workspace::Result<Vec<_>>>()?;
    let selected: Vec<_> = workspace
        .pending_changes()?
        .into_iter()
        .filter(|p| args.selects(p, &filters))
        .map(|p| p.change)
        .collect();

    let tracker = workspace.tracker();
    let request = match prepare_request(tracker.as_ref(), selected) {
        Ok(request) if !request.changes.is_empty() => request,
        Ok(_) | Err(rollback_core::Error::NoChanges) => {
            println!("{}", "No pending changes to revert".yellow());
            workspace.close();
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let refresh = Arc::new(LocalRefreshQueue::new(Handle::current()));
    let context = workspace.context(refresh);
    let title = context.action_title(&request.changes);

    println!("{}", format!("{} Preview", title).bold().cyan());
    println!("  {}: {}", "Change lists".bold(), request.change_lists.join(", "));
    println!();
    for change in &request.changes {
        println!(
            "  {} {} {}",
            display::kind_icon(change.kind()),
            display::describe(workspace.root(), change),
            display::revert_effect(change, options.delete_new_files)
        );
    }
    println!();

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("{} {} change(s)?", title, request.changes.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Aborted".yellow());
            workspace.close();
            return Ok(());
        }
    }

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let progress = Arc::new(BarProgress::new());
    let (settled_tx, settled_rx) = oneshot::channel();
    let orchestrator = Orchestrator::new(context)
        .with_progress(progress.clone())
        .with_cancellation(cancel)
        .on_settled(Box::new(move || {
            let _ = settled_tx.send(());
        }));

    let changes = request.changes;
    let outcome =
        tokio::task::spawn_blocking(move || orchestrator.rollback_with(changes, options)).await?;
    progress.bar.finish_and_clear();
    interrupt.abort();

    if !options.synchronous {
        println!("{}", "Waiting for refresh to settle...".dimmed());
        match tokio::time::timeout(settle_timeout, settled_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => println!("{}", "Refresh ended without reconciling".yellow()),
            Err(_) => println!(
                "{}",
                format!("Refresh still running after {}s", settle_timeout.as_secs()).yellow()
            ),
        }
    }
    workspace.close();

    println!();
    if outcome.cancelled {
        println!("{}", "⚠ Cancelled before every backend ran".yellow().bold());
    }
    if outcome.skipped_groups > 0 {
        println!(
            "  {} backend group(s) had no rollback support",
            outcome.skipped_groups.to_string().yellow()
        );
    }
    if outcome.unresolved > 0 {
        println!(
            "  {} change(s) belong to no backend",
            outcome.unresolved.to_string().yellow()
        );
    }
    for path in &outcome.deleted {
        println!("  {} {}", "removed".red(), display::short_path(workspace.root(), path));
    }

    if outcome.is_success() {
        println!(
            "{}",
            format!("✓ {} touched {} path(s)", title, outcome.touched.len())
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!("⚠ {} finished with {} failure(s)", title, outcome.report.len())
                .red()
                .bold()
        );
        println!();
        println!("{}", "Errors:".red().bold());
        for failure in outcome.report.failures() {
            println!("  {}", failure.to_string().red());
        }
    }

    Ok(())
}
