//! Contracts for the change-tracking subsystem, session liveness and the
//! history bracket around reconciliation.

use crate::model::Change;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Deferred work handed to reconciliation.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Write access to dirty-path bookkeeping. Only reachable through
/// [`ChangeTracker::run_exclusive`].
pub trait DirtyScope {
    /// Flag `path` for a rescan; `recursive` covers everything beneath a
    /// directory.
    fn mark_dirty(&mut self, path: &Path, recursive: bool);
}

pub trait ChangeTracker: Send + Sync {
    /// Name of the change list holding `change`, or `None` when the tracker
    /// does not know the change.
    fn change_list_of(&self, change: &Change) -> Option<String>;

    /// Called before any backend runs. The returned continuation runs once
    /// reconciliation has marked the touched paths dirty.
    fn prepare_for_change_deletion(&self, _changes: &[Change]) -> Continuation {
        Box::new(|| {})
    }

    /// Runs `unit` while holding exclusive write access to tracking state.
    ///
    /// Only the dirty marking runs inside `unit`. The continuation from
    /// [`ChangeTracker::prepare_for_change_deletion`] runs after this
    /// returns, outside the exclusive section, so it must acquire its own
    /// access to tracking state. Another writer may run between the two.
    fn run_exclusive(&self, unit: &mut dyn FnMut(&mut dyn DirtyScope));
}

/// Whether the owning project/session still exists.
pub trait SessionLiveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl SessionLiveness for AtomicBool {
    fn is_alive(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

pub trait History: Send + Sync {
    fn begin(&self, label: &str) -> Box<dyn HistoryAction>;
}

pub trait HistoryAction: Send {
    fn finish(self: Box<Self>);
}

/// History that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl History for NoHistory {
    fn begin(&self, _label: &str) -> Box<dyn HistoryAction> {
        Box::new(NoHistory)
    }
}

impl HistoryAction for NoHistory {
    fn finish(self: Box<Self>) {}
}

/// An open history action that is finished exactly once, either by
/// [`HistoryBracket::close`] or when dropped.
pub struct HistoryBracket {
    action: Option<Box<dyn HistoryAction>>,
}

impl HistoryBracket {
    pub fn open(history: &dyn History, label: &str) -> Self {
        Self {
            action: Some(history.begin(label)),
        }
    }

    pub fn close(&mut self) {
        if let Some(action) = self.action.take() {
            action.finish();
        }
    }

    pub fn is_open(&self) -> bool {
        self.action.is_some()
    }
}

impl Drop for HistoryBracket {
    fn drop(&mut self) {
        self.close();
    }
}
