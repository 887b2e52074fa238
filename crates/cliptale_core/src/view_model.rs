use std::path::PathBuf;

use crate::ClipStatus;

/// What the presentation shows for the selected item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipDetailsView {
    pub path: Option<PathBuf>,
    pub file_name: String,
    pub status_text: String,
    pub label: String,
    pub can_generate: bool,
    pub can_save: bool,
    pub can_revert: bool,
    pub can_add: bool,
    pub can_remove: bool,
}

impl ClipDetailsView {
    /// Details shown when nothing is selected.
    pub fn empty() -> Self {
        Self {
            file_name: "N/A".to_string(),
            status_text: "N/A".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRowView {
    pub path: PathBuf,
    pub file_name: String,
    pub status: ClipStatus,
    pub busy: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub rows: Vec<ClipRowView>,
    pub details: ClipDetailsView,
    pub dirty: bool,
}
