//! Workspace configuration
//!
//! Loaded from `.rollback/config.toml` in the workspace root. A missing
//! file means defaults: the whole root belongs to the snapshot backend.

use rollback_core::{BackendId, BackendResolver, Change};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

pub const CONFIG_FILE: &str = "config.toml";

pub const SNAPSHOT_BACKEND: &str = "snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory to backend mappings
    #[serde(default = "default_mappings")]
    pub mappings: Vec<Mapping>,

    /// Revert defaults
    #[serde(default)]
    pub revert: RevertSettings,
}

/// Assigns every path under `path` to `backend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Directory relative to the workspace root
    pub path: PathBuf,

    /// Backend identity
    pub backend: String,

    /// Disabled mappings own their paths but revert nothing
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevertSettings {
    /// Delete files that were newly added once their backend reverted cleanly
    #[serde(default)]
    pub delete_added_files: bool,

    /// Reconcile tracking state before the command returns
    #[serde(default)]
    pub refresh_synchronously: bool,

    /// Revert backend groups concurrently
    #[serde(default)]
    pub parallel: bool,

    /// How long to wait for deferred reconciliation before exiting
    #[serde(default = "default_settle_timeout_secs")]
    pub settle_timeout_secs: u64,
}

fn default_mappings() -> Vec<Mapping> {
    vec![Mapping {
        path: PathBuf::from("."),
        backend: SNAPSHOT_BACKEND.to_string(),
        enabled: true,
    }]
}

fn default_true() -> bool {
    true
}

fn default_settle_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mappings: default_mappings(),
            revert: RevertSettings::default(),
        }
    }
}

impl Default for RevertSettings {
    fn default() -> Self {
        Self {
            delete_added_files: false,
            refresh_synchronously: false,
            parallel: false,
            settle_timeout_secs: default_settle_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from `<dir>/config.toml`, falling back to defaults when absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// Distinct backend identities of enabled mappings, in mapping order.
    pub fn enabled_backends(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = Vec::new();
        for mapping in self.mappings.iter().filter(|m| m.enabled) {
            let id = BackendId::new(mapping.backend.as_str());
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn resolver(&self, root: &Path) -> MappingResolver {
        MappingResolver::new(root, &self.mappings)
    }
}

/// Resolves a change to the backend of the deepest mapping containing it.
/// A disabled deepest mapping leaves the change unresolved.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    roots: Vec<(PathBuf, BackendId, bool)>,
}

impl MappingResolver {
    pub fn new(root: &Path, mappings: &[Mapping]) -> Self {
        let mut roots: Vec<_> = mappings
            .iter()
            .map(|m| {
                (
                    normalize(&root.join(&m.path)),
                    BackendId::new(m.backend.as_str()),
                    m.enabled,
                )
            })
            .collect();
        roots.sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));
        Self { roots }
    }

    pub fn resolve_path(&self, path: &Path) -> Option<BackendId> {
        let path = normalize(path);
        let (_, backend, enabled) = self.roots.iter().find(|(root, _, _)| path.starts_with(root))?;
        enabled.then(|| backend.clone())
    }
}

impl BackendResolver for MappingResolver {
    fn resolve(&self, change: &Change) -> Option<BackendId> {
        self.resolve_path(change.path())
    }
}

/// Drops `.` components so `root/./src` and `root/src` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollback_core::ContentRef;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.enabled_backends(), vec![BackendId::new(SNAPSHOT_BACKEND)]);
        assert_eq!(config.revert.settle_timeout_secs, 30);
    }

    #[test]
    fn test_parse_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            r#"
            [[mappings]]
            path = "."
            backend = "snapshot"

            [[mappings]]
            path = "vendor"
            backend = "vendored"
            enabled = false

            [revert]
            delete_added_files = true
            "#,
        )
        .unwrap();

        let config = Config::load(temp_dir.path()).unwrap();

        assert_eq!(config.mappings.len(), 2);
        assert!(config.mappings[0].enabled);
        assert!(!config.mappings[1].enabled);
        assert!(config.revert.delete_added_files);
        assert!(!config.revert.parallel);
        assert_eq!(config.enabled_backends(), vec![BackendId::new("snapshot")]);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.revert.parallel = true;

        config.save(temp_dir.path()).unwrap();

        assert_eq!(Config::load(temp_dir.path()).unwrap(), config);
    }

    #[test]
    fn test_deepest_mapping_wins() {
        let root = Path::new("/work");
        let mappings = vec![
            Mapping {
                path: PathBuf::from("."),
                backend: "outer".to_string(),
                enabled: true,
            },
            Mapping {
                path: PathBuf::from("libs/inner"),
                backend: "inner".to_string(),
                enabled: true,
            },
            Mapping {
                path: PathBuf::from("vendor"),
                backend: "vendored".to_string(),
                enabled: false,
            },
        ];
        let resolver = MappingResolver::new(root, &mappings);

        assert_eq!(
            resolver.resolve_path(Path::new("/work/src/main.rs")),
            Some(BackendId::new("outer"))
        );
        assert_eq!(
            resolver.resolve_path(Path::new("/work/libs/inner/lib.rs")),
            Some(BackendId::new("inner"))
        );
        assert_eq!(resolver.resolve_path(Path::new("/work/vendor/zlib.c")), None);
        assert_eq!(resolver.resolve_path(Path::new("/elsewhere/file")), None);

        let change = Change::added(ContentRef::file("/work/libs/inner/new.rs"));
        assert_eq!(resolver.resolve(&change), Some(BackendId::new("inner")));
    }
}
