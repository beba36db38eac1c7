use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_VERSION: i32 = 1;

pub const DEFAULT_CHANGE_LIST: &str = "Default";

/// Content snapshot a tracked file is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub content_hash: String,
    pub change_list: String,
    pub tracked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub path: PathBuf,
    pub change_list: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyPath {
    pub path: PathBuf,
    pub recursive: bool,
    pub marked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub label: String,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
}

/// SQLite-backed tracking state. Paths are stored relative to the
/// workspace root.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS change_lists (
                name TEXT PRIMARY KEY,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS baselines (
                path TEXT PRIMARY KEY,
                content BLOB NOT NULL,
                content_hash TEXT NOT NULL,
                change_list TEXT NOT NULL,
                tracked_at TEXT NOT NULL,
                FOREIGN KEY (change_list) REFERENCES change_lists(name)
            );

            CREATE TABLE IF NOT EXISTS added_files (
                path TEXT PRIMARY KEY,
                change_list TEXT NOT NULL,
                added_at TEXT NOT NULL,
                FOREIGN KEY (change_list) REFERENCES change_lists(name)
            );

            CREATE TABLE IF NOT EXISTS dirty_paths (
                path TEXT PRIMARY KEY,
                recursive INTEGER NOT NULL,
                marked_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                started TEXT NOT NULL,
                finished TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_baselines_list ON baselines(change_list);
            CREATE INDEX IF NOT EXISTS idx_added_list ON added_files(change_list);
            CREATE INDEX IF NOT EXISTS idx_history_started ON history(started);
            "#,
        )?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?;

        if version.is_none() {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }

        self.ensure_change_list(DEFAULT_CHANGE_LIST)?;

        Ok(())
    }

    // Change list operations
    pub fn ensure_change_list(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO change_lists (name, position)
             VALUES (?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM change_lists))",
            params![name],
        )?;
        Ok(())
    }

    pub fn change_lists(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM change_lists ORDER BY position")?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    /// Deletes change lists with no baselines or added files, except `keep`.
    pub fn prune_empty_change_lists(&self, keep: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM change_lists
             WHERE name != ?1
               AND name NOT IN (SELECT change_list FROM baselines)
               AND name NOT IN (SELECT change_list FROM added_files)",
            params![keep],
        )?;
        Ok(removed)
    }

    // Baseline operations
    pub fn upsert_baseline(&self, path: &Path, content: &[u8], hash: &str, change_list: &str) -> Result<()> {
        self.ensure_change_list(change_list)?;
        self.conn.execute(
            "INSERT INTO baselines (path, content, content_hash, change_list, tracked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                content = excluded.content,
                content_hash = excluded.content_hash,
                change_list = excluded.change_list,
                tracked_at = excluded.tracked_at",
            params![
                path_key(path),
                content,
                hash,
                change_list,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_baseline(&self, path: &Path) -> Result<Option<Baseline>> {
        let baseline = self
            .conn
            .query_row(
                "SELECT path, content, content_hash, change_list, tracked_at
                 FROM baselines WHERE path = ?1",
                params![path_key(path)],
                baseline_from_row,
            )
            .optional()?;
        Ok(baseline)
    }

    pub fn baselines(&self) -> Result<Vec<Baseline>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, content, content_hash, change_list, tracked_at
             FROM baselines ORDER BY path",
        )?;

        let baselines = stmt
            .query_map([], baseline_from_row)?
            .collect::<rusqlite::Result<Vec<Baseline>>>()?;

        Ok(baselines)
    }

    // Added file operations
    pub fn add_file(&self, path: &Path, change_list: &str) -> Result<()> {
        self.ensure_change_list(change_list)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO added_files (path, change_list, added_at) VALUES (?1, ?2, ?3)",
            params![path_key(path), change_list, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_added(&self, path: &Path) -> Result<Option<AddedFile>> {
        let added = self
            .conn
            .query_row(
                "SELECT path, change_list, added_at FROM added_files WHERE path = ?1",
                params![path_key(path)],
                added_from_row,
            )
            .optional()?;
        Ok(added)
    }

    /// Returns false when `path` was not recorded as added.
    pub fn remove_added(&self, path: &Path) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM added_files WHERE path = ?1",
            params![path_key(path)],
        )?;
        Ok(removed > 0)
    }

    pub fn added_files(&self) -> Result<Vec<AddedFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, change_list, added_at FROM added_files ORDER BY path")?;

        let added = stmt
            .query_map([], added_from_row)?
            .collect::<rusqlite::Result<Vec<AddedFile>>>()?;

        Ok(added)
    }

    // Dirty path operations
    pub fn mark_dirty(&mut self, paths: &[(PathBuf, bool)]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dirty_paths (path, recursive, marked_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET
                    recursive = MAX(recursive, excluded.recursive),
                    marked_at = excluded.marked_at",
            )?;
            for (path, recursive) in paths {
                stmt.execute(params![path_key(path), *recursive as i32, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn dirty_paths(&self) -> Result<Vec<DirtyPath>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, recursive, marked_at FROM dirty_paths ORDER BY path")?;

        let dirty = stmt
            .query_map([], |row| {
                let path: String = row.get(0)?;
                let recursive: i32 = row.get(1)?;
                let marked_at: String = row.get(2)?;
                Ok(DirtyPath {
                    path: PathBuf::from(path),
                    recursive: recursive != 0,
                    marked_at: parse_timestamp(2, &marked_at)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<DirtyPath>>>()?;

        Ok(dirty)
    }

    pub fn clear_dirty(&self) -> Result<usize> {
        let cleared = self.conn.execute("DELETE FROM dirty_paths", [])?;
        Ok(cleared)
    }

    // History operations
    pub fn start_history(&self, id: &Uuid, label: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO history (id, label, started, finished) VALUES (?1, ?2, ?3, NULL)",
            params![id.to_string(), label, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn finish_history(&self, id: &Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE history SET finished = ?1 WHERE id = ?2 AND finished IS NULL",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, label, started, finished FROM history ORDER BY started")?;

        let entries = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let label: String = row.get(1)?;
                let started: String = row.get(2)?;
                let finished: Option<String> = row.get(3)?;
                Ok(HistoryEntry {
                    id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
                    label,
                    started: parse_timestamp(2, &started)?,
                    finished: finished.map(|s| parse_timestamp(3, &s)).transpose()?,
                })
            })?
            .collect::<rusqlite::Result<Vec<HistoryEntry>>>()?;

        Ok(entries)
    }
}

pub type SharedStorage = Arc<Mutex<Storage>>;

/// Locks shared storage. A panic while holding the lock leaves the SQLite
/// connection usable, so poisoning is ignored.
pub fn lock_storage(storage: &Mutex<Storage>) -> MutexGuard<'_, Storage> {
    storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn baseline_from_row(row: &Row) -> rusqlite::Result<Baseline> {
    let path: String = row.get(0)?;
    let tracked_at: String = row.get(4)?;

    Ok(Baseline {
        path: PathBuf::from(path),
        content: row.get(1)?,
        content_hash: row.get(2)?,
        change_list: row.get(3)?,
        tracked_at: parse_timestamp(4, &tracked_at)?,
    })
}

fn added_from_row(row: &Row) -> rusqlite::Result<AddedFile> {
    let path: String = row.get(0)?;
    let added_at: String = row.get(2)?;

    Ok(AddedFile {
        path: PathBuf::from(path),
        change_list: row.get(1)?,
        added_at: parse_timestamp(2, &added_at)?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}
