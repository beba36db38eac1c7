use colored::{ColoredString, Colorize};
use rollback_core::{Change, ChangeKind};
use std::path::Path;

pub fn kind_icon(kind: ChangeKind) -> ColoredString {
    match kind {
        ChangeKind::New => "+".green(),
        ChangeKind::Modified => "~".yellow(),
        ChangeKind::Deleted => "-".red(),
        ChangeKind::Moved => "→".blue(),
    }
}

/// What reverting `change` will do to the working tree.
pub fn revert_effect(change: &Change, delete_added: bool) -> ColoredString {
    match change.kind() {
        ChangeKind::New if delete_added => "will be removed".red(),
        ChangeKind::New => "will be forgotten".dimmed(),
        ChangeKind::Modified => "will be restored".yellow(),
        ChangeKind::Deleted => "will be recreated".green(),
        ChangeKind::Moved => "will be moved back".blue(),
    }
}

/// `path` relative to `root` when it lies inside it.
pub fn short_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// One line per change, moves rendered as `old → new`.
pub fn describe(root: &Path, change: &Change) -> String {
    match (change.kind(), change.before(), change.after()) {
        (ChangeKind::Moved, Some(before), Some(after)) => format!(
            "{} → {}",
            short_path(root, &before.path),
            short_path(root, &after.path)
        ),
        _ => short_path(root, change.path()),
    }
}
