use rollback_core::{Continuation, RefreshQueue, RefreshRequest};
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub files: usize,
    pub directories: usize,
    pub missing: usize,
}

/// Rescans paths on the local filesystem. Asynchronous requests run on the
/// runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct LocalRefreshQueue {
    handle: Handle,
}

impl LocalRefreshQueue {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl RefreshQueue for LocalRefreshQueue {
    fn schedule(&self, request: RefreshRequest, on_complete: Continuation) {
        if request.synchronous {
            let stats = refresh_paths(&request.paths);
            info!(?stats, "Refreshed synchronously");
            on_complete();
            return;
        }

        self.handle.spawn_blocking(move || {
            let stats = refresh_paths(&request.paths);
            info!(?stats, "Refreshed in background");
            on_complete();
        });
    }
}

/// Walks every requested root, descending into directories.
pub fn refresh_paths(paths: &[PathBuf]) -> RefreshStats {
    let mut stats = RefreshStats::default();
    for path in paths {
        scan(path, &mut stats);
    }
    stats
}

fn scan(path: &Path, stats: &mut RefreshStats) {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => {
            debug!(path = %path.display(), "Refresh target is gone");
            stats.missing += 1;
            return;
        }
    };

    if !metadata.is_dir() {
        stats.files += 1;
        return;
    }

    stats.directories += 1;
    let Ok(entries) = std::fs::read_dir(path) else {
        stats.missing += 1;
        return;
    };
    for entry in entries.flatten() {
        scan(&entry.path(), stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    #[test]
    fn test_refresh_paths_counts_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::write(root.join("src/lib.rs"), b"").unwrap();
        std::fs::write(root.join("src/nested/mod.rs"), b"").unwrap();

        let stats = refresh_paths(&[root.join("src"), root.join("missing.txt")]);

        assert_eq!(
            stats,
            RefreshStats {
                files: 2,
                directories: 2,
                missing: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_synchronous_request_completes_inline() {
        let queue = LocalRefreshQueue::current().unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        queue.schedule(
            RefreshRequest {
                paths: Vec::new(),
                synchronous: true,
            },
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_asynchronous_request_completes_in_background() {
        let temp_dir = TempDir::new().unwrap();
        let queue = LocalRefreshQueue::current().unwrap();
        let (tx, rx) = oneshot::channel();

        queue.schedule(
            RefreshRequest {
                paths: vec![temp_dir.path().to_path_buf()],
                synchronous: false,
            },
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        rx.await.unwrap();
    }
}
