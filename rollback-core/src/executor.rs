use crate::backend::{BackendRegistry, FileDeleter};
use crate::model::{BackendId, Change, RevertFailure, TouchedPaths};
use crate::partition::BackendGroup;
use tracing::{debug, info, warn};

/// Observes group-level progress of a run.
pub trait ProgressSink: Send + Sync {
    fn run_started(&self, _groups: usize) {}

    fn group_started(&self, _backend: &BackendId, _changes: usize) {}

    fn group_finished(&self, _backend: &BackendId, _failures: usize) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// What happened to one backend group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    pub failures: Vec<RevertFailure>,
    pub touched: TouchedPaths,
    /// Added files removed from disk after a clean revert.
    pub deleted: Vec<std::path::PathBuf>,
    /// The backend had no rollback capability; nothing was attempted.
    pub skipped: bool,
}

pub struct RevertExecutor<'a> {
    registry: &'a BackendRegistry,
    deleter: &'a dyn FileDeleter,
    progress: &'a dyn ProgressSink,
    delete_new_files: bool,
}

impl<'a> RevertExecutor<'a> {
    pub fn new(
        registry: &'a BackendRegistry,
        deleter: &'a dyn FileDeleter,
        progress: &'a dyn ProgressSink,
        delete_new_files: bool,
    ) -> Self {
        Self {
            registry,
            deleter,
            progress,
            delete_new_files,
        }
    }

    pub fn revert(&self, group: &BackendGroup) -> GroupOutcome {
        self.revert_group(&group.backend, &group.changes)
    }

    pub fn revert_group(&self, backend: &BackendId, changes: &[Change]) -> GroupOutcome {
        let Some(capability) = self.registry.get(backend) else {
            debug!(%backend, "Backend has no rollback support, skipping group");
            return GroupOutcome {
                skipped: true,
                ..GroupOutcome::default()
            };
        };

        self.progress.group_started(backend, changes.len());

        let mut outcome = GroupOutcome::default();
        for change in changes {
            outcome.touched.record_change(change);
        }

        outcome.failures = capability.revert(changes);
        info!(
            %backend,
            changes = changes.len(),
            failures = outcome.failures.len(),
            "Reverted group"
        );

        if outcome.failures.is_empty() && self.delete_new_files {
            outcome.deleted = self.delete_added_files(changes);
        }

        self.progress.group_finished(backend, outcome.failures.len());
        outcome
    }

    fn delete_added_files(&self, changes: &[Change]) -> Vec<std::path::PathBuf> {
        let mut deleted = Vec::new();

        for change in changes.iter().filter(|c| c.is_new()) {
            let Some(after) = change.after() else {
                unreachable!("new change without an after revision");
            };

            // Cleanup errors are logged and dropped; they never reach the report.
            match self.deleter.delete(&after.path) {
                Ok(()) => deleted.push(after.path.clone()),
                Err(e) => warn!(path = %after.path.display(), "Failed to delete added file: {}", e),
            }
        }

        deleted
    }
}
