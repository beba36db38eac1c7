//! # rollback-core
//!
//! Orchestration core for reverting a batch of pending changes spread over
//! several version-control backends.
//!
//! A run partitions the changes by owning backend, asks each backend to
//! revert its group, aggregates the failures, optionally deletes files that
//! were newly added, and reconciles tracking state for every touched path
//! either inline or in the background.

pub mod backend;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod partition;
pub mod reconcile;
pub mod refresh;
pub mod report;
pub mod tracking;

pub use backend::{BackendRegistry, BackendResolver, FileDeleter, LocalFileDeleter, RollbackCapability};
pub use error::{Error, Result};
pub use executor::{GroupOutcome, NoProgress, ProgressSink, RevertExecutor};
pub use model::{
    BackendId, Change, ChangeKind, ChangeList, ContentRef, RevertFailure, TouchedPath, TouchedPaths,
};
pub use orchestrator::{
    prepare_request, ExecutionMode, Orchestrator, OrchestratorState, RollbackContext,
    RollbackOptions, RollbackOutcome, RollbackRequest,
};
pub use partition::{partition, BackendGroup, Partition};
pub use reconcile::{ReconciliationScheduler, RefreshMode};
pub use refresh::{nearest_valid_ancestor, RefreshQueue, RefreshRequest};
pub use report::FailureReport;
pub use tracking::{
    ChangeTracker, Continuation, DirtyScope, History, HistoryAction, HistoryBracket, NoHistory,
    SessionLiveness,
};
