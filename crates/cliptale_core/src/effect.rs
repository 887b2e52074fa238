use std::path::PathBuf;

/// Work the control surface asks the runner to perform outside `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run extract -> transcribe -> label for the item.
    Generate { path: PathBuf },
    /// Rename the item to embed `label` and journal the rename.
    Save { path: PathBuf, label: String },
    /// Undo a journaled rename.
    Revert { path: PathBuf },
    /// Ask the journal whether the item can be reverted.
    CheckRevertible { path: PathBuf },
}
