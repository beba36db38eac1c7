use crate::config::Config;
use crate::error::{Error, Result};
use crate::hashing::hash_content;
use crate::session::Session;
use crate::snapshot::SnapshotBackend;
use crate::storage::{lock_storage, DirtyPath, HistoryEntry, SharedStorage, Storage};
use crate::tracker::{PendingChange, StoreHistory, StoreTracker};
use rollback_core::{BackendRegistry, RefreshQueue, RollbackContext};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub const WORKSPACE_DIR: &str = ".rollback";
pub const DB_FILE: &str = "rollback.db";

/// An opened workspace: configuration, change store and a live session.
pub struct Workspace {
    root: PathBuf,
    config: Config,
    storage: SharedStorage,
    session: Arc<Session>,
}

impl Workspace {
    pub fn init(root: &Path) -> Result<Self> {
        let root = absolute_path(root)?;
        let dir = root.join(WORKSPACE_DIR);
        if dir.exists() {
            return Err(Error::AlreadyInitialized(dir.display().to_string()));
        }

        std::fs::create_dir_all(&dir)?;
        Config::default().save(&dir)?;
        info!(root = %root.display(), "Initialized workspace");

        Self::open(&root)
    }

    pub fn open(root: &Path) -> Result<Self> {
        let root = absolute_path(root)?;
        let dir = root.join(WORKSPACE_DIR);
        if !dir.is_dir() {
            return Err(Error::NotInitialized(root.display().to_string()));
        }

        let config = Config::load(&dir)?;
        let storage = Arc::new(Mutex::new(Storage::new(dir.join(DB_FILE))?));
        let session = Arc::new(Session::new(root.clone()));

        Ok(Self {
            root,
            config,
            storage,
            session,
        })
    }

    /// Opens the nearest workspace at or above `start`.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = absolute_path(start)?;
        for candidate in start.ancestors() {
            if candidate.join(WORKSPACE_DIR).is_dir() {
                return Self::open(candidate);
            }
        }
        Err(Error::NotInitialized(start.display().to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// `path` made absolute against the current directory, with `.` and
    /// `..` folded away so one file always maps to one store key.
    pub fn absolute(&self, path: &Path) -> Result<PathBuf> {
        absolute_path(path)
    }

    /// Records the current content of `path` as its baseline.
    pub fn track(&self, path: &Path, change_list: &str) -> Result<PathBuf> {
        let path = self.absolute(path)?;
        let relative = self.checked_relative(&path)?;
        if !path.is_file() {
            return Err(Error::InvalidPath(format!("{} is not a file", path.display())));
        }

        let content = std::fs::read(&path)?;
        let hash = hash_content(&content);
        lock_storage(&self.storage).upsert_baseline(&relative, &content, &hash, change_list)?;
        info!(path = %relative.display(), change_list, "Tracking file");
        Ok(relative)
    }

    /// Records `path` as newly added.
    pub fn add(&self, path: &Path, change_list: &str) -> Result<PathBuf> {
        let path = self.absolute(path)?;
        let relative = self.checked_relative(&path)?;
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        lock_storage(&self.storage).add_file(&relative, change_list)?;
        info!(path = %relative.display(), change_list, "Added file");
        Ok(relative)
    }

    pub fn pending_changes(&self) -> Result<Vec<PendingChange>> {
        self.tracker().pending_changes()
    }

    pub fn change_lists(&self) -> Result<Vec<String>> {
        lock_storage(&self.storage).change_lists()
    }

    pub fn dirty_paths(&self) -> Result<Vec<DirtyPath>> {
        lock_storage(&self.storage).dirty_paths()
    }

    pub fn clear_dirty(&self) -> Result<usize> {
        lock_storage(&self.storage).clear_dirty()
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        lock_storage(&self.storage).history()
    }

    pub fn tracker(&self) -> Arc<StoreTracker> {
        Arc::new(StoreTracker::new(self.root.clone(), Arc::clone(&self.storage)))
    }

    /// A snapshot backend for every enabled backend identity in the config.
    pub fn registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        for id in self.config.enabled_backends() {
            let backend = SnapshotBackend::new(id.clone(), self.root.clone(), Arc::clone(&self.storage));
            registry.register(id, Arc::new(backend));
        }
        registry
    }

    pub fn context(&self, refresh: Arc<dyn RefreshQueue>) -> RollbackContext {
        RollbackContext::new(
            Arc::new(self.config.resolver(&self.root)),
            self.tracker(),
            refresh,
            self.session.clone(),
        )
        .with_registry(self.registry())
        .with_history(Arc::new(StoreHistory::new(Arc::clone(&self.storage))))
    }

    pub fn close(&self) {
        self.session.close();
    }

    fn checked_relative(&self, path: &Path) -> Result<PathBuf> {
        let relative = relative_to(&self.root, path)?;
        if relative.starts_with(WORKSPACE_DIR) {
            return Err(Error::InvalidPath(format!(
                "{} is inside the workspace metadata directory",
                path.display()
            )));
        }
        Ok(relative)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

pub fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            Error::InvalidPath(format!(
                "{} is outside {}",
                path.display(),
                root.display()
            ))
        })
}
