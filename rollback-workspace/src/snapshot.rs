use crate::error::{Error, Result};
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::workspace::relative_to;
use rollback_core::{BackendId, Change, ChangeKind, ContentRef, RevertFailure, RollbackCapability};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reverts changes against the baselines recorded in the change store.
///
/// Modified and deleted files get their baseline content back. Moved files
/// are restored at their old path and removed from the new one. New files
/// are only forgotten; deleting them is left to cleanup.
pub struct SnapshotBackend {
    id: BackendId,
    root: PathBuf,
    storage: SharedStorage,
}

impl SnapshotBackend {
    pub fn new(id: BackendId, root: PathBuf, storage: SharedStorage) -> Self {
        Self { id, root, storage }
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    fn revert_change(&self, storage: &Storage, change: &Change) -> Result<()> {
        match change.kind() {
            ChangeKind::New => {
                let after = side(change.after(), change)?;
                self.forget_added(storage, &after.path)
            }
            ChangeKind::Modified | ChangeKind::Deleted => {
                let before = side(change.before(), change)?;
                self.restore(storage, &before.path)
            }
            ChangeKind::Moved => {
                let before = side(change.before(), change)?;
                let after = side(change.after(), change)?;
                self.restore(storage, &before.path)?;
                remove_path(&after.path)?;
                storage.remove_added(&relative_to(&self.root, &after.path)?)?;
                Ok(())
            }
        }
    }

    fn restore(&self, storage: &Storage, path: &Path) -> Result<()> {
        let relative = relative_to(&self.root, path)?;
        let baseline = storage
            .get_baseline(&relative)?
            .ok_or_else(|| Error::NotFound(format!("no baseline for {}", relative.display())))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &baseline.content)?;
        debug!(path = %relative.display(), "Restored baseline");
        Ok(())
    }

    fn forget_added(&self, storage: &Storage, path: &Path) -> Result<()> {
        let relative = relative_to(&self.root, path)?;
        if !storage.remove_added(&relative)? {
            return Err(Error::NotFound(format!(
                "{} is not recorded as added",
                relative.display()
            )));
        }
        Ok(())
    }
}

impl RollbackCapability for SnapshotBackend {
    fn operation_name(&self) -> &str {
        "Revert"
    }

    fn revert(&self, changes: &[Change]) -> Vec<RevertFailure> {
        let storage = lock_storage(&self.storage);

        changes
            .iter()
            .filter_map(|change| {
                self.revert_change(&storage, change)
                    .err()
                    .map(|e| RevertFailure::new(e.to_string()).with_path(change.path()))
            })
            .collect()
    }
}

fn side<'a>(side: Option<&'a ContentRef>, change: &Change) -> Result<&'a ContentRef> {
    side.ok_or_else(|| {
        Error::InvalidPath(format!(
            "{} change at {} is missing a revision",
            change.kind(),
            change.path().display()
        ))
    })
}

fn remove_path(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path)?,
        Ok(_) => std::fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::hash_content;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn backend(root: &Path) -> (SnapshotBackend, SharedStorage) {
        let storage = Arc::new(Mutex::new(Storage::in_memory().unwrap()));
        let backend = SnapshotBackend::new(
            BackendId::new("snapshot"),
            root.to_path_buf(),
            Arc::clone(&storage),
        );
        (backend, storage)
    }

    fn baseline(storage: &SharedStorage, path: &str, content: &[u8]) {
        lock_storage(storage)
            .upsert_baseline(Path::new(path), content, &hash_content(content), "Default")
            .unwrap();
    }

    #[test]
    fn test_modified_and_deleted_restore_baseline() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (backend, storage) = backend(root);
        baseline(&storage, "edit.txt", b"original");
        baseline(&storage, "sub/gone.txt", b"was here");
        std::fs::write(root.join("edit.txt"), b"changed").unwrap();

        let failures = backend.revert(&[
            Change::modified(
                ContentRef::file(root.join("edit.txt")),
                ContentRef::file(root.join("edit.txt")),
            ),
            Change::deleted(ContentRef::file(root.join("sub/gone.txt"))),
        ]);

        assert!(failures.is_empty(), "{:?}", failures);
        assert_eq!(std::fs::read(root.join("edit.txt")).unwrap(), b"original");
        assert_eq!(std::fs::read(root.join("sub/gone.txt")).unwrap(), b"was here");
    }

    #[test]
    fn test_new_file_is_forgotten_not_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (backend, storage) = backend(root);
        std::fs::write(root.join("new.txt"), b"fresh").unwrap();
        lock_storage(&storage)
            .add_file(Path::new("new.txt"), "Default")
            .unwrap();

        let failures = backend.revert(&[Change::added(ContentRef::file(root.join("new.txt")))]);

        assert!(failures.is_empty());
        assert!(root.join("new.txt").exists());
        assert!(lock_storage(&storage).added_files().unwrap().is_empty());
    }

    #[test]
    fn test_moved_file_goes_back() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (backend, storage) = backend(root);
        baseline(&storage, "old.txt", b"content");
        std::fs::write(root.join("new.txt"), b"content").unwrap();
        lock_storage(&storage)
            .add_file(Path::new("new.txt"), "Default")
            .unwrap();

        let failures = backend.revert(&[Change::moved(
            ContentRef::file(root.join("old.txt")),
            ContentRef::file(root.join("new.txt")),
        )]);

        assert!(failures.is_empty(), "{:?}", failures);
        assert_eq!(std::fs::read(root.join("old.txt")).unwrap(), b"content");
        assert!(!root.join("new.txt").exists());
    }

    #[test]
    fn test_missing_baseline_fails_only_that_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (backend, storage) = backend(root);
        baseline(&storage, "known.txt", b"known");

        let failures = backend.revert(&[
            Change::deleted(ContentRef::file(root.join("unknown.txt"))),
            Change::deleted(ContentRef::file(root.join("known.txt"))),
        ]);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path.as_deref(), Some(root.join("unknown.txt").as_path()));
        assert!(failures[0].message.contains("no baseline"));
        assert!(root.join("known.txt").exists());
    }

    #[test]
    fn test_path_outside_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (backend, _storage) = backend(temp_dir.path());

        let failures = backend.revert(&[Change::added(ContentRef::file("/somewhere/else.txt"))]);

        assert_eq!(failures.len(), 1);
        assert_eq!(backend.operation_name(), "Revert");
    }
}
