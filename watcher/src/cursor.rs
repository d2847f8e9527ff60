//! Persistent per-repository commit cursors.
//!
//! The cursor table records, for each repository, the author date of the
//! newest commit already processed. It survives restarts as a JSON file so a
//! restarted watcher resumes where it left off instead of replaying history.
//!
//! # Durability
//!
//! Saves write the full table to a temporary file in the same directory and
//! then rename it over the target. A crash mid-write leaves either the old
//! table or the new one on disk, never a half-written file. Loads tolerate a
//! missing or corrupt file by starting from an empty table; corruption is
//! logged, not fatal.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{CursorTable, Snapshot};

/// Suffix appended to the cursor path for the temporary write target.
const TMP_SUFFIX: &str = "tmp";

/// Errors that can occur while persisting the cursor table.
#[derive(Error, Debug)]
pub enum CursorError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads and saves the cursor table at a fixed path.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Creates a store for the table at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted table.
    ///
    /// A missing file yields an empty table. A file that fails to parse also
    /// yields an empty table, with a warning, so corrupt state can never
    /// prevent startup.
    #[must_use]
    pub fn load(&self) -> CursorTable {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cursor file, starting empty");
                return CursorTable::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cursor file");
                return CursorTable::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cursor file is corrupt, starting empty"
                );
                CursorTable::new()
            }
        }
    }

    /// Writes the full table atomically.
    ///
    /// # Errors
    ///
    /// Returns a `CursorError` if the parent directory cannot be created,
    /// the temporary file cannot be written, or the rename fails.
    pub fn save(&self, table: &CursorTable) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let contents = serde_json::to_string_pretty(table)?;
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            repos = table.len(),
            "Cursor table saved"
        );
        Ok(())
    }

    /// Seeds cursors from the current snapshot, once.
    ///
    /// Only acts when `table` is empty: every repository's cursor is set to
    /// its `updated_at` and the table is persisted. This keeps a first run
    /// from replaying the entire commit history of every repository.
    ///
    /// Returns `true` when seeding happened.
    ///
    /// # Errors
    ///
    /// Returns a `CursorError` if persisting the seeded table fails.
    pub fn initialize_if_empty(
        &self,
        table: &mut CursorTable,
        snapshot: &Snapshot,
    ) -> Result<bool, CursorError> {
        if !table.is_empty() {
            return Ok(false);
        }

        let now = Utc::now();
        for (name, record) in snapshot {
            // updated_at is authoritative; fall back to the current time so
            // the cursor is never unset for a known repository.
            let seed = if record.updated_at.timestamp() > 0 {
                record.updated_at
            } else {
                now
            };
            table.insert(name.clone(), seed);
        }

        self.save(table)?;
        info!(repos = table.len(), "Seeded cursor table from snapshot");
        Ok(true)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !ext.is_empty() {
            ext.push('.');
        }
        ext.push_str(TMP_SUFFIX);
        self.path.with_extension(ext)
    }
}
