use std::path::PathBuf;

use crate::{SavedFile, Stage, TaskFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User added files to the working set.
    AddFiles(Vec<PathBuf>),
    /// User selected an item, or cleared the selection.
    Select(Option<PathBuf>),
    /// User removed the selected item from the working set.
    RemoveSelected,
    /// User asked for a label for the selected item.
    GenerateClicked,
    /// User edited the candidate label of the selected item.
    LabelEdited(String),
    /// User asked to rename the selected item using its candidate label.
    SaveClicked,
    /// User asked to undo the rename of the selected item.
    RevertClicked,
    /// A running generate task entered a new stage.
    StageChanged { path: PathBuf, stage: Stage },
    /// Generate task finished.
    GenerateDone {
        path: PathBuf,
        result: Result<String, TaskFailure>,
    },
    /// Save task finished.
    SaveDone {
        path: PathBuf,
        result: Result<SavedFile, TaskFailure>,
    },
    /// Revert task finished; `Ok` carries the restored path.
    RevertDone {
        path: PathBuf,
        result: Result<PathBuf, TaskFailure>,
    },
    /// Journal answer for a `CheckRevertible` effect.
    RevertibilityChecked { path: PathBuf, tracked: bool },
    /// Control loop tick.
    Tick,
}
