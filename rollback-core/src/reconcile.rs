use crate::model::TouchedPaths;
use crate::refresh::{nearest_valid_ancestor, RefreshQueue, RefreshRequest};
use crate::tracking::{
    ChangeTracker, Continuation, DirtyScope, History, HistoryBracket, SessionLiveness,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Tracking state is consistent before control returns.
    Synchronous,
    /// Tracking state settles later, off the caller's flow.
    Asynchronous,
}

impl RefreshMode {
    pub fn from_synchronous(synchronous: bool) -> Self {
        if synchronous {
            RefreshMode::Synchronous
        } else {
            RefreshMode::Asynchronous
        }
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self, RefreshMode::Synchronous)
    }
}

/// Drives the refresh of touched paths and the dirty marking that follows.
pub struct ReconciliationScheduler {
    tracker: Arc<dyn ChangeTracker>,
    refresh: Arc<dyn RefreshQueue>,
    session: Arc<dyn SessionLiveness>,
    history: Arc<dyn History>,
}

impl ReconciliationScheduler {
    pub fn new(
        tracker: Arc<dyn ChangeTracker>,
        refresh: Arc<dyn RefreshQueue>,
        session: Arc<dyn SessionLiveness>,
        history: Arc<dyn History>,
    ) -> Self {
        Self {
            tracker,
            refresh,
            session,
            history,
        }
    }

    /// Opens a history bracket, issues one refresh over `touched` and, once
    /// it completes, closes the bracket, marks every touched path dirty and
    /// runs `continuation`. Marking and the continuation are skipped when the
    /// session is gone by then.
    ///
    /// `continuation` runs after the exclusive section is released and may
    /// write tracking state itself.
    pub fn schedule(
        &self,
        touched: TouchedPaths,
        mode: RefreshMode,
        label: &str,
        continuation: Continuation,
    ) {
        let mut bracket = HistoryBracket::open(self.history.as_ref(), label);
        let request = RefreshRequest {
            paths: refresh_roots(&touched),
            synchronous: mode.is_synchronous(),
        };

        let tracker = Arc::clone(&self.tracker);
        let session = Arc::clone(&self.session);

        let on_complete: Continuation = Box::new(move || {
            bracket.close();

            if !session.is_alive() {
                debug!(paths = touched.len(), "Session closed before refresh finished");
                return;
            }

            tracker.run_exclusive(&mut |scope: &mut dyn DirtyScope| {
                for path in touched.iter() {
                    scope.mark_dirty(&path.path, path.is_directory);
                }
            });
            debug!(paths = touched.len(), "Marked touched paths dirty");

            continuation();
        });

        debug!(?mode, paths = request.paths.len(), "Scheduling refresh");
        self.refresh.schedule(request, on_complete);
    }
}

fn refresh_roots(touched: &TouchedPaths) -> Vec<std::path::PathBuf> {
    let mut seen = HashSet::new();
    touched
        .iter()
        .map(|t| nearest_valid_ancestor(&t.path))
        .filter(|root| seen.insert(root.clone()))
        .collect()
}
