pub mod add;
pub mod init;
pub mod revert;
pub mod status;
pub mod track;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use rollback_workspace::Workspace;
use std::path::{Path, PathBuf};

/// Opens the workspace enclosing the current directory.
pub fn open_workspace() -> Result<Workspace> {
    let cwd = std::env::current_dir()?;
    Workspace::discover(&cwd).context("No rollback workspace found. Run 'rollback init' first.")
}

/// Runs `record` on every path and prints one line per path. Fails when
/// no path was recorded at all.
pub fn record_each<F>(paths: &[PathBuf], icon: ColoredString, verb: &str, mut record: F) -> Result<usize>
where
    F: FnMut(&Path) -> rollback_workspace::Result<PathBuf>,
{
    let mut recorded = 0;
    for path in paths {
        match record(path) {
            Ok(relative) => {
                recorded += 1;
                println!("  {} {}", icon, relative.display());
            }
            Err(e) => println!("  {} {} - {}", "✗".red(), path.display(), e.to_string().red()),
        }
    }

    if recorded == 0 {
        anyhow::bail!("No files were {}", verb);
    }
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollback_workspace::Error;

    #[test]
    fn test_record_each_fails_when_nothing_recorded() {
        let paths = vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")];

        let err = record_each(&paths, "+".green(), "added", |p| {
            Err(Error::NotFound(p.display().to_string()))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "No files were added");
    }

    #[test]
    fn test_record_each_counts_partial_success() {
        let paths = vec![PathBuf::from("a.txt"), PathBuf::from("missing.txt")];

        let recorded = record_each(&paths, "✓".green(), "tracked", |p| {
            if p == Path::new("a.txt") {
                Ok(p.to_path_buf())
            } else {
                Err(Error::NotFound(p.display().to_string()))
            }
        })
        .unwrap();

        assert_eq!(recorded, 1);
    }
}
