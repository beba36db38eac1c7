use crate::tracking::Continuation;
use std::path::{Path, PathBuf};

/// One batched refresh over a set of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub paths: Vec<PathBuf>,
    pub synchronous: bool,
}

/// Filesystem refresh plumbing.
///
/// A synchronous request must run `on_complete` before `schedule` returns.
/// An asynchronous request returns immediately and runs `on_complete` later
/// on whatever thread the refresh finishes on. Either way `on_complete`
/// runs at most once.
pub trait RefreshQueue: Send + Sync {
    fn schedule(&self, request: RefreshRequest, on_complete: Continuation);
}

/// The path itself if it exists, otherwise its closest existing ancestor.
/// Falls back to `path` when nothing on the chain exists.
pub fn nearest_valid_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .filter(|candidate| !candidate.as_os_str().is_empty())
        .find(|candidate| candidate.exists())
        .unwrap_or(path)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_path_is_its_own_ancestor() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("kept.txt");
        std::fs::write(&file, b"kept").unwrap();

        assert_eq!(nearest_valid_ancestor(&file), file);
    }

    #[test]
    fn test_deleted_path_resolves_to_parent() {
        let temp_dir = TempDir::new().unwrap();
        let gone = temp_dir.path().join("a").join("b").join("gone.txt");

        assert_eq!(nearest_valid_ancestor(&gone), temp_dir.path());
    }

    #[test]
    fn test_relative_missing_path_falls_back() {
        let missing = Path::new("definitely-missing-dir/file.txt");
        assert_eq!(nearest_valid_ancestor(missing), missing);
    }
}
