use crate::error::Result;
use crate::hashing::hash_content;
use crate::storage::{lock_storage, AddedFile, SharedStorage, DEFAULT_CHANGE_LIST};
use crate::workspace::relative_to;
use rollback_core::{
    Change, ChangeKind, ChangeTracker, ContentRef, Continuation, DirtyScope, History,
    HistoryAction,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A change computed from the store, with the list it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    pub change: Change,
    pub change_list: String,
}

/// Change tracking backed by the SQLite store.
pub struct StoreTracker {
    root: PathBuf,
    storage: SharedStorage,
}

impl StoreTracker {
    pub fn new(root: PathBuf, storage: SharedStorage) -> Self {
        Self { root, storage }
    }

    /// Compares every baseline with disk and lists added files.
    ///
    /// A deleted baseline whose content shows up in an added file is
    /// reported as a single MOVED change.
    pub fn pending_changes(&self) -> Result<Vec<PendingChange>> {
        let (baselines, added) = {
            let storage = lock_storage(&self.storage);
            (storage.baselines()?, storage.added_files()?)
        };

        let mut added: Vec<(AddedFile, Option<String>)> = added
            .into_iter()
            .map(|a| {
                let hash = std::fs::read(self.root.join(&a.path))
                    .ok()
                    .map(|content| hash_content(&content));
                (a, hash)
            })
            .collect();

        let mut pending = Vec::new();
        for baseline in baselines {
            let path = self.root.join(&baseline.path);
            let before = ContentRef::file(&path).with_hash(baseline.content_hash.as_str());

            match std::fs::read(&path) {
                Ok(content) => {
                    let hash = hash_content(&content);
                    if hash != baseline.content_hash {
                        pending.push(PendingChange {
                            change: Change::modified(before, ContentRef::file(&path).with_hash(hash)),
                            change_list: baseline.change_list,
                        });
                    }
                }
                Err(e) if e.kind() != std::io::ErrorKind::NotFound && !path.is_dir() => {
                    warn!(path = %baseline.path.display(), "Skipping unreadable tracked file: {}", e);
                }
                // Missing, or replaced by a directory: the tracked file is gone.
                Err(_) => {
                    let moved_to = added
                        .iter()
                        .position(|(_, hash)| hash.as_deref() == Some(baseline.content_hash.as_str()));
                    let change = match moved_to {
                        Some(index) => {
                            let (target, _) = added.remove(index);
                            let after = ContentRef::file(self.root.join(&target.path))
                                .with_hash(baseline.content_hash.as_str());
                            Change::moved(before, after)
                        }
                        None => Change::deleted(before),
                    };
                    pending.push(PendingChange {
                        change,
                        change_list: baseline.change_list,
                    });
                }
            }
        }

        for (file, hash) in added {
            let path = self.root.join(&file.path);
            let after = if path.is_dir() {
                ContentRef::directory(path)
            } else {
                match hash {
                    Some(hash) => ContentRef::file(path).with_hash(hash),
                    None => ContentRef::file(path),
                }
            };
            pending.push(PendingChange {
                change: Change::added(after),
                change_list: file.change_list,
            });
        }

        Ok(pending)
    }

    fn lookup_change_list(&self, change: &Change) -> Result<Option<String>> {
        let storage = lock_storage(&self.storage);
        let list = match change.kind() {
            ChangeKind::New => {
                let relative = relative_to(&self.root, change.path())?;
                storage.get_added(&relative)?.map(|a| a.change_list)
            }
            _ => {
                let before = change.before().map(|b| b.path.as_path()).unwrap_or(change.path());
                let relative = relative_to(&self.root, before)?;
                storage.get_baseline(&relative)?.map(|b| b.change_list)
            }
        };
        Ok(list)
    }
}

struct CollectingScope<'a> {
    root: &'a Path,
    marks: Vec<(PathBuf, bool)>,
}

impl DirtyScope for CollectingScope<'_> {
    fn mark_dirty(&mut self, path: &Path, recursive: bool) {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        self.marks.push((relative.to_path_buf(), recursive));
    }
}

impl ChangeTracker for StoreTracker {
    fn change_list_of(&self, change: &Change) -> Option<String> {
        match self.lookup_change_list(change) {
            Ok(list) => list,
            Err(e) => {
                warn!(path = %change.path().display(), "Failed to look up change list: {}", e);
                None
            }
        }
    }

    fn prepare_for_change_deletion(&self, changes: &[Change]) -> Continuation {
        let storage = Arc::clone(&self.storage);
        let count = changes.len();

        Box::new(move || {
            match lock_storage(&storage).prune_empty_change_lists(DEFAULT_CHANGE_LIST) {
                Ok(0) => {}
                Ok(removed) => info!(removed, changes = count, "Pruned empty change lists"),
                Err(e) => warn!("Failed to prune change lists: {}", e),
            }
        })
    }

    fn run_exclusive(&self, unit: &mut dyn FnMut(&mut dyn DirtyScope)) {
        let mut storage = lock_storage(&self.storage);
        let mut scope = CollectingScope {
            root: &self.root,
            marks: Vec::new(),
        };

        unit(&mut scope);

        if let Err(e) = storage.mark_dirty(&scope.marks) {
            error!(paths = scope.marks.len(), "Failed to record dirty paths: {}", e);
        }
    }
}

/// History log kept in the store's `history` table.
pub struct StoreHistory {
    storage: SharedStorage,
}

impl StoreHistory {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }
}

struct StoreHistoryAction {
    id: Uuid,
    storage: SharedStorage,
}

impl History for StoreHistory {
    fn begin(&self, label: &str) -> Box<dyn HistoryAction> {
        let id = Uuid::new_v4();
        if let Err(e) = lock_storage(&self.storage).start_history(&id, label) {
            warn!(label, "Failed to start history action: {}", e);
        }
        Box::new(StoreHistoryAction {
            id,
            storage: Arc::clone(&self.storage),
        })
    }
}

impl HistoryAction for StoreHistoryAction {
    fn finish(self: Box<Self>) {
        if let Err(e) = lock_storage(&self.storage).finish_history(&self.id) {
            warn!(id = %self.id, "Failed to finish history action: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn tracker(root: &Path) -> (StoreTracker, SharedStorage) {
        let storage = Arc::new(Mutex::new(Storage::in_memory().unwrap()));
        (StoreTracker::new(root.to_path_buf(), Arc::clone(&storage)), storage)
    }

    fn track(storage: &SharedStorage, root: &Path, path: &str, content: &[u8], list: &str) {
        std::fs::write(root.join(path), content).unwrap();
        lock_storage(storage)
            .upsert_baseline(Path::new(path), content, &hash_content(content), list)
            .unwrap();
    }

    #[test]
    fn test_pending_changes_detects_each_kind() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, storage) = tracker(root);

        track(&storage, root, "clean.txt", b"clean", "Default");
        track(&storage, root, "edit.txt", b"before", "feature");
        track(&storage, root, "gone.txt", b"gone", "Default");
        track(&storage, root, "old.txt", b"moving", "Default");

        std::fs::write(root.join("edit.txt"), b"after").unwrap();
        std::fs::remove_file(root.join("gone.txt")).unwrap();
        std::fs::rename(root.join("old.txt"), root.join("renamed.txt")).unwrap();
        std::fs::write(root.join("fresh.txt"), b"fresh").unwrap();
        {
            let storage = lock_storage(&storage);
            storage.add_file(Path::new("renamed.txt"), "Default").unwrap();
            storage.add_file(Path::new("fresh.txt"), "feature").unwrap();
        }

        let pending = tracker.pending_changes().unwrap();
        let summary: Vec<_> = pending
            .iter()
            .map(|p| (p.change.kind(), p.change.path().strip_prefix(root).unwrap().to_path_buf()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ChangeKind::Modified, PathBuf::from("edit.txt")),
                (ChangeKind::Deleted, PathBuf::from("gone.txt")),
                (ChangeKind::Moved, PathBuf::from("renamed.txt")),
                (ChangeKind::New, PathBuf::from("fresh.txt")),
            ]
        );
        assert_eq!(pending[0].change_list, "feature");
        assert_eq!(pending[3].change_list, "feature");
    }

    #[test]
    fn test_baseline_replaced_by_directory_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, storage) = tracker(root);

        track(&storage, root, "a.txt", b"a", "Default");
        track(&storage, root, "b.txt", b"b", "Default");
        std::fs::write(root.join("b.txt"), b"b edited").unwrap();
        std::fs::remove_file(root.join("a.txt")).unwrap();
        std::fs::create_dir(root.join("a.txt")).unwrap();

        let pending = tracker.pending_changes().unwrap();
        let summary: Vec<_> = pending
            .iter()
            .map(|p| (p.change.kind(), p.change.path().strip_prefix(root).unwrap().to_path_buf()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ChangeKind::Deleted, PathBuf::from("a.txt")),
                (ChangeKind::Modified, PathBuf::from("b.txt")),
            ]
        );
    }

    #[test]
    fn test_change_list_of_untracked_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, storage) = tracker(root);
        track(&storage, root, "edit.txt", b"before", "feature");

        let tracked = Change::modified(
            ContentRef::file(root.join("edit.txt")),
            ContentRef::file(root.join("edit.txt")),
        );
        let untracked = Change::added(ContentRef::file(root.join("stray.txt")));

        assert_eq!(tracker.change_list_of(&tracked), Some("feature".to_string()));
        assert_eq!(tracker.change_list_of(&untracked), None);
    }

    #[test]
    fn test_exclusive_marks_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, storage) = tracker(root);

        tracker.run_exclusive(&mut |scope: &mut dyn DirtyScope| {
            scope.mark_dirty(&root.join("src"), true);
            scope.mark_dirty(&root.join("README.md"), false);
        });

        let dirty = lock_storage(&storage).dirty_paths().unwrap();
        let paths: Vec<_> = dirty.iter().map(|d| (d.path.clone(), d.recursive)).collect();
        assert_eq!(
            paths,
            vec![(PathBuf::from("README.md"), false), (PathBuf::from("src"), true)]
        );
    }

    #[test]
    fn test_deletion_notifier_prunes_lists() {
        let temp_dir = TempDir::new().unwrap();
        let (tracker, storage) = tracker(temp_dir.path());
        lock_storage(&storage).ensure_change_list("empty").unwrap();

        let notifier = tracker.prepare_for_change_deletion(&[]);
        notifier();

        assert_eq!(lock_storage(&storage).change_lists().unwrap(), vec!["Default"]);
    }

    #[test]
    fn test_history_action_finishes() {
        let storage = Arc::new(Mutex::new(Storage::in_memory().unwrap()));
        let history = StoreHistory::new(Arc::clone(&storage));

        let action = history.begin("Revert");
        assert!(lock_storage(&storage).history().unwrap()[0].finished.is_none());
        action.finish();

        let entries = lock_storage(&storage).history().unwrap();
        assert_eq!(entries[0].label, "Revert");
        assert!(entries[0].finished.is_some());
    }
}
