use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use thiserror::Error;

use crate::journal::{rename_guard, resolve_path, JournalError, RenameJournal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertOutcome {
    pub old_path: PathBuf,
    pub original_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum RevertError {
    #[error("'{0}' not found in rename log")]
    NotFound(PathBuf),
    #[error("cannot revert: original path {original} already exists")]
    Collision { original: PathBuf },
    #[error("failed to rename {from} back to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Journal(JournalError),
}

/// Renames `current` back to the original path recorded in `journal`.
///
/// Nothing on disk changes unless the entry exists and the original path is
/// free. The entry is dropped only after the file has moved back. No other save
/// or revert in this process runs between the lookup and the journal update.
pub fn revert(journal: &RenameJournal, current: &Path) -> Result<RevertOutcome, RevertError> {
    let old_path = resolve_path(current).map_err(RevertError::Journal)?;
    let _rename = rename_guard();
    let original_path = match journal.lookup_original(&old_path) {
        Ok(original) => original,
        Err(JournalError::NotFound(path)) => return Err(RevertError::NotFound(path)),
        Err(err) => return Err(RevertError::Journal(err)),
    };

    if original_path.exists() {
        return Err(RevertError::Collision {
            original: original_path,
        });
    }

    fs::rename(&old_path, &original_path).map_err(|source| RevertError::Rename {
        from: old_path.clone(),
        to: original_path.clone(),
        source,
    })?;
    engine_info!("Reverted {:?} -> {:?}", old_path, original_path);

    match journal.remove(&old_path) {
        Ok(true) => {}
        Ok(false) => engine_warn!("Rename log entry for {:?} vanished during revert", old_path),
        Err(err) => engine_warn!(
            "Reverted {:?} but could not update the rename log: {}",
            old_path,
            err
        ),
    }

    Ok(RevertOutcome {
        old_path,
        original_path,
    })
}
