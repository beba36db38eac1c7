use chrono::{DateTime, Utc};
use rollback_core::SessionLiveness;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

/// A live handle on an opened workspace. Deferred reconciliation checks it
/// before touching tracking state.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    root_path: PathBuf,
    started: DateTime<Utc>,
    alive: AtomicBool,
}

impl Session {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            root_path,
            started: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            info!(session = %self.id, "Session closed");
        }
    }
}

impl SessionLiveness for Session {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
