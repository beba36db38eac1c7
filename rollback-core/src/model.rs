use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    New,
    Modified,
    Deleted,
    Moved,
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Moved => "moved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ChangeKind::New),
            "modified" => Some(ChangeKind::Modified),
            "deleted" => Some(ChangeKind::Deleted),
            "moved" => Some(ChangeKind::Moved),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a change: where the content lives and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub path: PathBuf,
    pub is_directory: bool,
    pub content_hash: Option<String>,
}

impl ContentRef {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            content_hash: None,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            content_hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}

/// A single pending modification.
///
/// The before/after pair always matches the kind: NEW has no before side,
/// DELETED has no after side, MODIFIED and MOVED carry both. Construction
/// goes through [`Change::new`] or the kind-specific constructors, so a
/// `Change` that exists is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    kind: ChangeKind,
    before: Option<ContentRef>,
    after: Option<ContentRef>,
}

impl Change {
    pub fn new(
        kind: ChangeKind,
        before: Option<ContentRef>,
        after: Option<ContentRef>,
    ) -> Result<Self> {
        let well_formed = match kind {
            ChangeKind::New => before.is_none() && after.is_some(),
            ChangeKind::Deleted => before.is_some() && after.is_none(),
            ChangeKind::Modified | ChangeKind::Moved => before.is_some() && after.is_some(),
        };

        if !well_formed {
            return Err(Error::InvalidChange(format!(
                "{} change with before={} after={}",
                kind,
                before.is_some(),
                after.is_some()
            )));
        }

        Ok(Self {
            kind,
            before,
            after,
        })
    }

    pub fn added(after: ContentRef) -> Self {
        Self {
            kind: ChangeKind::New,
            before: None,
            after: Some(after),
        }
    }

    pub fn modified(before: ContentRef, after: ContentRef) -> Self {
        Self {
            kind: ChangeKind::Modified,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(before: ContentRef) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            before: Some(before),
            after: None,
        }
    }

    pub fn moved(before: ContentRef, after: ContentRef) -> Self {
        Self {
            kind: ChangeKind::Moved,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn before(&self) -> Option<&ContentRef> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&ContentRef> {
        self.after.as_ref()
    }

    pub fn is_new(&self) -> bool {
        self.kind == ChangeKind::New
    }

    /// The path a user would recognise the change by: the after side when
    /// there is one.
    pub fn path(&self) -> &Path {
        match (&self.after, &self.before) {
            (Some(after), _) => &after.path,
            (None, Some(before)) => &before.path,
            (None, None) => unreachable!("change without any content reference"),
        }
    }

    /// Every location this change affects, before side first.
    pub fn touched_paths(&self) -> Vec<TouchedPath> {
        let mut paths = Vec::with_capacity(2);
        for side in [&self.before, &self.after].into_iter().flatten() {
            if paths.iter().all(|p: &TouchedPath| p.path != side.path) {
                paths.push(TouchedPath {
                    path: side.path.clone(),
                    is_directory: side.is_directory,
                });
            }
        }
        paths
    }
}

/// A named, ordered grouping of changes as the user organised them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeList {
    pub name: String,
    pub changes: Vec<Change>,
}

impl ChangeList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
        }
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn contains(&self, change: &Change) -> bool {
        self.changes.iter().any(|c| c == change)
    }
}

/// Identifies the backend that owns a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A problem a backend reported while reverting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertFailure {
    pub path: Option<PathBuf>,
    pub message: String,
}

impl RevertFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for RevertFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TouchedPath {
    pub path: PathBuf,
    pub is_directory: bool,
}

/// Touched paths in first-seen order, each path at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedPaths {
    paths: Vec<TouchedPath>,
    seen: HashSet<PathBuf>,
}

impl TouchedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, touched: TouchedPath) -> bool {
        if !self.seen.insert(touched.path.clone()) {
            return false;
        }
        self.paths.push(touched);
        true
    }

    pub fn record_change(&mut self, change: &Change) {
        for touched in change.touched_paths() {
            self.insert(touched);
        }
    }

    pub fn merge(&mut self, other: TouchedPaths) {
        for touched in other.paths {
            self.insert(touched);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TouchedPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_vec(self) -> Vec<TouchedPath> {
        self.paths
    }
}
