//! Backend-facing contracts: resolving who owns a change and asking that
//! owner to revert a batch.

use crate::model::{BackendId, Change, RevertFailure};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A backend's revert operation.
///
/// `revert` receives the whole group in one call so the backend can batch.
/// Problems are returned as values; an empty list means every change was
/// reverted.
pub trait RollbackCapability: Send + Sync {
    fn operation_name(&self) -> &str {
        "Rollback"
    }

    fn revert(&self, changes: &[Change]) -> Vec<RevertFailure>;
}

/// Maps a change to the backend that owns it, if any.
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, change: &Change) -> Option<BackendId>;
}

impl<F> BackendResolver for F
where
    F: Fn(&Change) -> Option<BackendId> + Send + Sync,
{
    fn resolve(&self, change: &Change) -> Option<BackendId> {
        self(change)
    }
}

/// Rollback capabilities keyed by backend identity.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    capabilities: HashMap<BackendId, Arc<dyn RollbackCapability>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: BackendId, capability: Arc<dyn RollbackCapability>) {
        self.capabilities.insert(id, capability);
    }

    pub fn with_backend(mut self, id: BackendId, capability: Arc<dyn RollbackCapability>) -> Self {
        self.register(id, capability);
        self
    }

    pub fn get(&self, id: &BackendId) -> Option<Arc<dyn RollbackCapability>> {
        self.capabilities.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.capabilities.keys().collect();
        ids.sort();
        f.debug_struct("BackendRegistry").field("backends", &ids).finish()
    }
}

/// Removes files left behind by reverted additions.
pub trait FileDeleter: Send + Sync {
    fn delete(&self, path: &Path) -> std::io::Result<()>;
}

/// Deletes from the local filesystem; directories go recursively.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileDeleter;

impl FileDeleter for LocalFileDeleter {
    fn delete(&self, path: &Path) -> std::io::Result<()> {
        let metadata = std::fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentRef;
    use tempfile::TempDir;

    struct Noop;

    impl RollbackCapability for Noop {
        fn revert(&self, _changes: &[Change]) -> Vec<RevertFailure> {
            Vec::new()
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = BackendRegistry::new().with_backend(BackendId::new("git"), Arc::new(Noop));

        assert!(registry.get(&BackendId::new("git")).is_some());
        assert!(registry.get(&BackendId::new("hg")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_operation_name() {
        assert_eq!(Noop.operation_name(), "Rollback");
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |change: &Change| {
            change
                .path()
                .starts_with("vendor")
                .then(|| BackendId::new("svn"))
        };

        let inside = Change::added(ContentRef::file("vendor/lib.c"));
        let outside = Change::added(ContentRef::file("src/main.c"));

        assert_eq!(resolver.resolve(&inside), Some(BackendId::new("svn")));
        assert_eq!(resolver.resolve(&outside), None);
    }

    #[test]
    fn test_local_deleter_removes_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("added.txt");
        let dir = temp_dir.path().join("added_dir");
        std::fs::write(&file, b"new").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/inner.txt"), b"x").unwrap();

        LocalFileDeleter.delete(&file).unwrap();
        LocalFileDeleter.delete(&dir).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(LocalFileDeleter.delete(&file).is_err());
    }
}
