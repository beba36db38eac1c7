use crate::backend::BackendResolver;
use crate::model::{BackendId, Change};
use std::collections::HashMap;
use tracing::debug;

/// Changes owned by one backend, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendGroup {
    pub backend: BackendId,
    pub changes: Vec<Change>,
}

/// Changes grouped by owning backend.
///
/// Groups appear in the order their backend was first seen in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    groups: Vec<BackendGroup>,
    unresolved: usize,
}

impl Partition {
    pub fn groups(&self) -> &[BackendGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<BackendGroup> {
        self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.groups.iter().map(|g| g.changes.len()).sum()
    }

    /// Number of input changes dropped because no backend resolved.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    pub fn single_backend(&self) -> Option<&BackendId> {
        match self.groups.as_slice() {
            [only] => Some(&only.backend),
            _ => None,
        }
    }
}

pub fn partition<I>(changes: I, resolver: &dyn BackendResolver) -> Partition
where
    I: IntoIterator<Item = Change>,
{
    let mut result = Partition::default();
    let mut index: HashMap<BackendId, usize> = HashMap::new();

    for change in changes {
        let Some(backend) = resolver.resolve(&change) else {
            debug!(path = %change.path().display(), "No backend owns change, skipping");
            result.unresolved += 1;
            continue;
        };

        let slot = *index.entry(backend.clone()).or_insert_with(|| {
            result.groups.push(BackendGroup {
                backend,
                changes: Vec::new(),
            });
            result.groups.len() - 1
        });
        result.groups[slot].changes.push(change);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentRef;
    use std::path::Path;

    fn by_top_dir(change: &Change) -> Option<BackendId> {
        let first = change.path().components().next()?;
        match first.as_os_str().to_str()? {
            "git" => Some(BackendId::new("git")),
            "hg" => Some(BackendId::new("hg")),
            _ => None,
        }
    }

    fn modified(path: &str) -> Change {
        Change::modified(ContentRef::file(path), ContentRef::file(path))
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let changes = vec![
            modified("hg/a"),
            modified("git/b"),
            modified("hg/c"),
            modified("git/d"),
        ];

        let partition = partition(changes, &by_top_dir);
        let backends: Vec<_> = partition.groups().iter().map(|g| g.backend.as_str()).collect();

        assert_eq!(backends, vec!["hg", "git"]);
        let hg_paths: Vec<_> = partition.groups()[0]
            .changes
            .iter()
            .map(|c| c.path().to_path_buf())
            .collect();
        assert_eq!(hg_paths, vec![Path::new("hg/a"), Path::new("hg/c")]);
    }

    #[test]
    fn test_unresolved_changes_are_dropped() {
        let changes = vec![modified("other/a"), modified("git/b"), modified("other/c")];

        let partition = partition(changes, &by_top_dir);

        assert_eq!(partition.change_count(), 1);
        assert_eq!(partition.unresolved(), 2);
        assert_eq!(partition.single_backend(), Some(&BackendId::new("git")));
    }

    #[test]
    fn test_no_change_lands_in_two_groups() {
        let changes = vec![
            modified("git/a"),
            modified("hg/b"),
            modified("git/c"),
            modified("nowhere/d"),
        ];
        let resolvable = changes.iter().filter(|c| by_top_dir(c).is_some()).count();

        let partition = partition(changes, &by_top_dir);

        assert_eq!(partition.change_count(), resolvable);
        for group in partition.groups() {
            for change in &group.changes {
                assert_eq!(by_top_dir(change).as_ref(), Some(&group.backend));
            }
        }
        assert!(partition.single_backend().is_none());
    }

    #[test]
    fn test_empty_input() {
        let partition = partition(Vec::new(), &by_top_dir);
        assert!(partition.is_empty());
        assert_eq!(partition.unresolved(), 0);
    }
}
