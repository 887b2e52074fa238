//! Durable record of renames, keyed by the renamed path.
//!
//! The backing file is the only source of truth: every query re-reads it, and
//! every mutation rewrites it in full.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use engine_logging::{engine_debug, engine_info, engine_warn};
use thiserror::Error;

use crate::persist::{write_atomic, PersistError};

pub const JOURNAL_DIR: &str = ".cliptale";
pub const JOURNAL_FILENAME: &str = "cliptale_rename_log.json";

// Serialises read-modify-write cycles across every journal instance in the process.
static JOURNAL_LOCK: Mutex<()> = Mutex::new(());

// Taken before JOURNAL_LOCK, never while holding it.
static RENAME_LOCK: Mutex<()> = Mutex::new(());

/// Exclusive right to move journaled files within this process.
///
/// Hold the guard from the check that a target path is free until the journal
/// reflects the move, so no other save or revert can claim the same path.
pub(crate) fn rename_guard() -> MutexGuard<'static, ()> {
    RENAME_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("'{0}' not found in rename log")]
    NotFound(PathBuf),
    #[error("'{0}' is already tracked in the rename log")]
    AlreadyTracked(PathBuf),
    #[error("home directory could not be determined")]
    NoHomeDir,
    #[error("failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize rename log: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write rename log: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone)]
pub struct RenameJournal {
    path: PathBuf,
}

impl RenameJournal {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.cliptale/cliptale_rename_log.json`
    pub fn default_path() -> Result<PathBuf, JournalError> {
        let home = dirs::home_dir().ok_or(JournalError::NoHomeDir)?;
        Ok(home.join(JOURNAL_DIR).join(JOURNAL_FILENAME))
    }

    pub fn open_default() -> Result<Self, JournalError> {
        Ok(Self::at(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records that `renamed` is a rename of `original`.
    ///
    /// Refuses to overwrite an existing entry for `renamed`.
    pub fn record(&self, original: &Path, renamed: &Path) -> Result<(), JournalError> {
        let original = resolve_path(original)?;
        let renamed = resolve_path(renamed)?;
        let key = path_key(&renamed);

        let _guard = JOURNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        if entries.contains_key(&key) {
            return Err(JournalError::AlreadyTracked(renamed));
        }
        entries.insert(key, path_key(&original));
        self.store(&entries)?;
        engine_info!(
            "Journaled rename {} -> {}",
            original.display(),
            renamed.display()
        );
        Ok(())
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        let Ok(resolved) = resolve_path(path) else {
            return false;
        };
        let _guard = JOURNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().contains_key(&path_key(&resolved))
    }

    pub fn lookup_original(&self, renamed: &Path) -> Result<PathBuf, JournalError> {
        let resolved = resolve_path(renamed)?;
        let _guard = JOURNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
            .remove(&path_key(&resolved))
            .map(PathBuf::from)
            .ok_or(JournalError::NotFound(resolved))
    }

    /// Removes the entry for `renamed`. Returns whether an entry existed.
    pub fn remove(&self, renamed: &Path) -> Result<bool, JournalError> {
        let resolved = resolve_path(renamed)?;
        let _guard = JOURNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        if entries.remove(&path_key(&resolved)).is_none() {
            return Ok(false);
        }
        self.store(&entries)?;
        engine_info!("Removed {} from rename log", resolved.display());
        Ok(true)
    }

    /// Snapshot of every entry, renamed path to original path.
    pub fn entries(&self) -> BTreeMap<String, String> {
        let _guard = JOURNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    // A missing, unreadable or corrupt file reads as an empty journal.
    fn load(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return BTreeMap::new();
            }
            Err(err) => {
                engine_warn!(
                    "Failed to read rename log {:?}, treating it as empty: {}",
                    self.path,
                    err
                );
                return BTreeMap::new();
            }
        };
        if content.trim().is_empty() {
            return BTreeMap::new();
        }
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                engine_warn!(
                    "Failed to parse rename log {:?}, treating it as empty: {}",
                    self.path,
                    err
                );
                BTreeMap::new()
            }
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), JournalError> {
        let content = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.path, &content)?;
        engine_debug!("Wrote {} rename log entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}

/// Canonical form of `path` when it exists, otherwise its absolute form.
pub fn resolve_path(path: &Path) -> Result<PathBuf, JournalError> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(_) => {
            // A missing leaf still gets a canonical parent so keys stay comparable.
            let absolute = std::path::absolute(path).map_err(|source| JournalError::Resolve {
                path: path.to_path_buf(),
                source,
            })?;
            match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => match fs::canonicalize(parent) {
                    Ok(parent) => Ok(parent.join(name)),
                    Err(_) => Ok(absolute),
                },
                _ => Ok(absolute),
            }
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_leaf_resolves_against_canonical_parent() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.mp4");
        let resolved = resolve_path(&missing).unwrap();
        assert_eq!(
            resolved,
            fs::canonicalize(dir.path()).unwrap().join("gone.mp4")
        );
    }

    #[test]
    fn empty_file_reads_as_empty_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILENAME);
        fs::write(&path, "  \n").unwrap();
        assert!(RenameJournal::at(&path).entries().is_empty());
    }
}
