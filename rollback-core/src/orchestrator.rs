use crate::backend::{BackendRegistry, BackendResolver, FileDeleter, LocalFileDeleter};
use crate::error::{Error, Result};
use crate::executor::{GroupOutcome, NoProgress, ProgressSink, RevertExecutor};
use crate::model::{Change, RevertFailure, TouchedPath, TouchedPaths};
use crate::partition::{partition, BackendGroup, Partition};
use crate::reconcile::{ReconciliationScheduler, RefreshMode};
use crate::refresh::RefreshQueue;
use crate::report::FailureReport;
use crate::tracking::{ChangeTracker, Continuation, History, NoHistory, SessionLiveness};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_ACTION_TITLE: &str = "Rollback";

/// Everything a run talks to.
#[derive(Clone)]
pub struct RollbackContext {
    pub resolver: Arc<dyn BackendResolver>,
    pub registry: BackendRegistry,
    pub tracker: Arc<dyn ChangeTracker>,
    pub refresh: Arc<dyn RefreshQueue>,
    pub session: Arc<dyn SessionLiveness>,
    pub history: Arc<dyn History>,
    pub deleter: Arc<dyn FileDeleter>,
}

impl RollbackContext {
    pub fn new(
        resolver: Arc<dyn BackendResolver>,
        tracker: Arc<dyn ChangeTracker>,
        refresh: Arc<dyn RefreshQueue>,
        session: Arc<dyn SessionLiveness>,
    ) -> Self {
        Self {
            resolver,
            registry: BackendRegistry::new(),
            tracker,
            refresh,
            session,
            history: Arc::new(NoHistory),
            deleter: Arc::new(LocalFileDeleter),
        }
    }

    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn History>) -> Self {
        self.history = history;
        self
    }

    pub fn with_deleter(mut self, deleter: Arc<dyn FileDeleter>) -> Self {
        self.deleter = deleter;
        self
    }

    /// The single owning backend's operation name, or the generic title.
    pub fn action_title(&self, changes: &[Change]) -> String {
        let partition = partition(changes.iter().cloned(), self.resolver.as_ref());
        self.title_for(&partition)
    }

    fn title_for(&self, partition: &Partition) -> String {
        partition
            .single_backend()
            .and_then(|id| self.registry.get(id))
            .map(|capability| capability.operation_name().to_string())
            .unwrap_or_else(|| DEFAULT_ACTION_TITLE.to_string())
    }
}

/// Changes that passed the change-list gate, with the lists they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRequest {
    pub changes: Vec<Change>,
    pub change_lists: Vec<String>,
}

/// Keeps the changes the tracker places in some change list.
///
/// Rejects an empty input with [`Error::NoChanges`]. A non-empty input whose
/// changes all fall outside every list yields an empty request.
pub fn prepare_request(tracker: &dyn ChangeTracker, changes: Vec<Change>) -> Result<RollbackRequest> {
    if changes.is_empty() {
        return Err(Error::NoChanges);
    }

    let mut request = RollbackRequest {
        changes: Vec::with_capacity(changes.len()),
        change_lists: Vec::new(),
    };

    for change in changes {
        match tracker.change_list_of(&change) {
            Some(list) => {
                if !request.change_lists.contains(&list) {
                    request.change_lists.push(list);
                }
                request.changes.push(change);
            }
            None => debug!(path = %change.path().display(), "Change is in no change list"),
        }
    }

    Ok(request)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollbackOptions {
    pub delete_new_files: bool,
    pub synchronous: bool,
    pub execution: ExecutionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Partitioning,
    Executing,
    Reporting,
    RefreshNow,
    RefreshDeferred,
    Done,
}

/// Result of the execution phase. Reconciliation may still be pending when
/// this is returned in asynchronous mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub report: FailureReport,
    pub touched: Vec<TouchedPath>,
    pub deleted: Vec<std::path::PathBuf>,
    pub groups: usize,
    pub skipped_groups: usize,
    pub unresolved: usize,
    pub cancelled: bool,
    /// Every state the run passed through, `Idle` first and `Done` last.
    pub phases: Vec<OrchestratorState>,
}

impl RollbackOutcome {
    pub fn is_success(&self) -> bool {
        self.report.is_success() && !self.cancelled
    }

    pub fn into_failures(self) -> Vec<RevertFailure> {
        self.report.into_failures()
    }
}

/// Runs one rollback: partition, revert per backend, report, reconcile.
///
/// Consumed by [`Orchestrator::rollback`]; a finished orchestrator cannot be
/// run again.
pub struct Orchestrator {
    context: RollbackContext,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    on_settled: Option<Continuation>,
    state: OrchestratorState,
    phases: Vec<OrchestratorState>,
}

impl Orchestrator {
    pub fn new(context: RollbackContext) -> Self {
        Self {
            context,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
            on_settled: None,
            state: OrchestratorState::Idle,
            phases: vec![OrchestratorState::Idle],
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs after the tracker's own post-refresh continuation, only when the
    /// session is still alive.
    pub fn on_settled(mut self, continuation: Continuation) -> Self {
        self.on_settled = Some(continuation);
        self
    }

    pub fn rollback(
        self,
        changes: Vec<Change>,
        delete_new_files: bool,
        synchronous: bool,
    ) -> Vec<RevertFailure> {
        self.rollback_with(
            changes,
            RollbackOptions {
                delete_new_files,
                synchronous,
                ..RollbackOptions::default()
            },
        )
        .into_failures()
    }

    pub fn rollback_with(mut self, changes: Vec<Change>, options: RollbackOptions) -> RollbackOutcome {
        let notifier = self.context.tracker.prepare_for_change_deletion(&changes);

        self.transition(OrchestratorState::Partitioning);
        let partition = partition(changes, self.context.resolver.as_ref());
        let title = self.context.title_for(&partition);
        let unresolved = partition.unresolved();

        self.transition(OrchestratorState::Executing);
        let groups = partition.into_groups();
        self.progress.run_started(groups.len());
        let outcomes = match options.execution {
            ExecutionMode::Sequential => self.execute_sequential(&groups, options.delete_new_files),
            ExecutionMode::Parallel => self.execute_parallel(&groups, options.delete_new_files),
        };

        self.transition(OrchestratorState::Reporting);
        let mut outcome = RollbackOutcome {
            groups: groups.len(),
            unresolved,
            cancelled: outcomes.len() < groups.len() || outcomes.iter().any(Option::is_none),
            ..RollbackOutcome::default()
        };
        let mut touched = TouchedPaths::new();
        for (group, result) in groups.iter().zip(outcomes) {
            let Some(result) = result else { continue };
            if result.skipped {
                outcome.skipped_groups += 1;
                continue;
            }
            outcome.report.absorb(&group.backend, result.failures);
            outcome.deleted.extend(result.deleted);
            touched.merge(result.touched);
        }
        outcome.touched = touched.iter().cloned().collect();

        if outcome.cancelled {
            warn!(completed = outcome.report.backends().count(), "Rollback cancelled between groups");
        }
        info!(
            groups = outcome.groups,
            failures = outcome.report.len(),
            touched = touched.len(),
            "Rollback executed"
        );

        let mode = RefreshMode::from_synchronous(options.synchronous);
        self.transition(match mode {
            RefreshMode::Synchronous => OrchestratorState::RefreshNow,
            RefreshMode::Asynchronous => OrchestratorState::RefreshDeferred,
        });

        let on_settled = self.on_settled.take();
        let continuation: Continuation = Box::new(move || {
            notifier();
            if let Some(on_settled) = on_settled {
                on_settled();
            }
        });

        let scheduler = ReconciliationScheduler::new(
            Arc::clone(&self.context.tracker),
            Arc::clone(&self.context.refresh),
            Arc::clone(&self.context.session),
            Arc::clone(&self.context.history),
        );
        scheduler.schedule(touched, mode, &title, continuation);

        self.transition(OrchestratorState::Done);
        outcome.phases = std::mem::take(&mut self.phases);
        outcome
    }

    fn executor(&self, delete_new_files: bool) -> RevertExecutor<'_> {
        RevertExecutor::new(
            &self.context.registry,
            self.context.deleter.as_ref(),
            self.progress.as_ref(),
            delete_new_files,
        )
    }

    fn execute_sequential(
        &self,
        groups: &[BackendGroup],
        delete_new_files: bool,
    ) -> Vec<Option<GroupOutcome>> {
        let executor = self.executor(delete_new_files);
        let mut outcomes = Vec::with_capacity(groups.len());

        for group in groups {
            if self.cancel.is_cancelled() {
                break;
            }
            outcomes.push(Some(executor.revert(group)));
        }

        outcomes
    }

    /// One scoped thread per group. Results are joined in group order.
    fn execute_parallel(
        &self,
        groups: &[BackendGroup],
        delete_new_files: bool,
    ) -> Vec<Option<GroupOutcome>> {
        let executor = self.executor(delete_new_files);
        let executor = &executor;
        let cancel = &self.cancel;

        std::thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| {
                    scope.spawn(move || {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        Some(executor.revert(group))
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = ?self.state, to = ?next, "Orchestrator state change");
        self.state = next;
        self.phases.push(next);
    }
}
