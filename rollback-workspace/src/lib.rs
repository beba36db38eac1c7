//! # rollback-workspace
//!
//! A local workspace for `rollback-core`: a SQLite change store holding
//! baselines and added files, a snapshot backend that restores them, a
//! filesystem refresh queue and the session that guards reconciliation.

pub mod config;
pub mod error;
pub mod hashing;
pub mod refresh;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod tracker;
pub mod workspace;

pub use config::{Config, Mapping, MappingResolver, RevertSettings, SNAPSHOT_BACKEND};
pub use error::{Error, Result};
pub use refresh::{refresh_paths, LocalRefreshQueue, RefreshStats};
pub use session::Session;
pub use snapshot::SnapshotBackend;
pub use storage::{
    AddedFile, Baseline, DirtyPath, HistoryEntry, SharedStorage, Storage, DEFAULT_CHANGE_LIST,
};
pub use tracker::{PendingChange, StoreHistory, StoreTracker};
pub use workspace::{relative_to, Workspace, DB_FILE, WORKSPACE_DIR};
