use std::fmt;
use std::path::{Path, PathBuf};

use crate::view_model::{AppViewModel, ClipDetailsView, ClipRowView};

/// Progress stages reported by a running generate task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Transcribing,
    Labeling,
}

/// Lifecycle of a single media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipStatus {
    #[default]
    New,
    Extracting,
    Transcribing,
    Labeling,
    Labeled,
    Saving,
    Saved,
    Reverting,
    Reverted,
    Error,
}

impl From<Stage> for ClipStatus {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Extracting => ClipStatus::Extracting,
            Stage::Transcribing => ClipStatus::Transcribing,
            Stage::Labeling => ClipStatus::Labeling,
        }
    }
}

/// Classification of a failed task, as seen by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Extraction,
    Auth,
    Connectivity,
    Call,
    Io,
    NotFound,
    Collision,
    Internal,
}

/// A task failure carried back to the control thread as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Status line shown to the user for this failure.
    ///
    /// Remote failures carry their own remediation hint and are shown verbatim.
    pub fn status_text(&self) -> String {
        match self.kind {
            FailureKind::Extraction => format!("Audio extraction failed: {}", self.message),
            FailureKind::Validation => format!("Error: {}", self.message),
            FailureKind::Auth | FailureKind::Connectivity => self.message.clone(),
            FailureKind::Call => format!("Label generation failed: {}", self.message),
            FailureKind::Io | FailureKind::NotFound | FailureKind::Collision => {
                format!("Error: {}", self.message)
            }
            FailureKind::Internal => format!("Unexpected error: {}", self.message),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_text())
    }
}

/// Result of a save that moved the file.
///
/// `warning` is set when the rename succeeded but could not be journaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub new_path: PathBuf,
    pub warning: Option<String>,
}

pub const STATUS_READY: &str = "Ready to generate label";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    path: PathBuf,
    status: ClipStatus,
    status_text: String,
    label: String,
    last_error: Option<TaskFailure>,
    busy: bool,
    revertible: bool,
    // Status to fall back to when an in-flight save or revert fails.
    resume_status: ClipStatus,
}

impl MediaItem {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            status: ClipStatus::New,
            status_text: STATUS_READY.to_string(),
            label: String::new(),
            last_error: None,
            busy: false,
            revertible: false,
            resume_status: ClipStatus::New,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> ClipStatus {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn last_error(&self) -> Option<&TaskFailure> {
        self.last_error.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_revertible(&self) -> bool {
        self.revertible
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn begin(&mut self, status: ClipStatus, text: &str) {
        self.resume_status = self.status;
        self.status = status;
        self.status_text = text.to_string();
        self.busy = true;
    }

    fn finish(&mut self, status: ClipStatus, text: String) {
        self.status = status;
        self.status_text = text;
        self.busy = false;
    }

    fn fail(&mut self, status: ClipStatus, failure: TaskFailure) {
        let text = failure.status_text();
        self.last_error = Some(failure);
        self.finish(status, text);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    items: Vec<MediaItem>,
    selected: Option<PathBuf>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            rows: self
                .items
                .iter()
                .map(|item| ClipRowView {
                    path: item.path.clone(),
                    file_name: item.file_name(),
                    status: item.status,
                    busy: item.busy,
                    selected: self.selected.as_deref() == Some(item.path.as_path()),
                })
                .collect(),
            details: self.details(),
            dirty: self.dirty,
        }
    }

    pub fn details(&self) -> ClipDetailsView {
        let any_busy = self.any_busy();
        let renaming = self.renaming_in_flight();
        match self.selected_item() {
            Some(item) => ClipDetailsView {
                path: Some(item.path.clone()),
                file_name: item.file_name(),
                status_text: item.status_text.clone(),
                label: item.label.clone(),
                can_generate: !item.busy,
                can_save: !item.busy && !renaming,
                can_revert: !item.busy && !renaming && item.revertible,
                can_add: !any_busy,
                can_remove: !any_busy,
            },
            None => ClipDetailsView {
                can_add: !any_busy,
                ..ClipDetailsView::empty()
            },
        }
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn item(&self, path: &Path) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.path == path)
    }

    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn selected_item(&self) -> Option<&MediaItem> {
        self.selected.as_deref().and_then(|path| self.item(path))
    }

    pub fn any_busy(&self) -> bool {
        self.items.iter().any(|item| item.busy)
    }

    /// Whether a save or revert is running for any item.
    ///
    /// Only one rename may be in flight at a time, across all items.
    pub fn renaming_in_flight(&self) -> bool {
        self.items.iter().any(|item| {
            item.busy && matches!(item.status, ClipStatus::Saving | ClipStatus::Reverting)
        })
    }

    /// Returns whether the state changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn add_item(&mut self, path: PathBuf) -> bool {
        if self.item(&path).is_some() {
            return false;
        }
        self.items.push(MediaItem::new(path));
        self.mark_dirty();
        true
    }

    pub(crate) fn select(&mut self, path: Option<PathBuf>) -> bool {
        let next = path.filter(|p| self.item(p).is_some());
        if next == self.selected {
            return false;
        }
        self.selected = next;
        self.mark_dirty();
        true
    }

    pub(crate) fn remove_selected(&mut self) -> Option<PathBuf> {
        let path = self.selected.take()?;
        self.items.retain(|item| item.path != path);
        self.mark_dirty();
        Some(path)
    }

    /// Selected item if it exists and has no task in flight.
    pub(crate) fn idle_selected_mut(&mut self) -> Option<&mut MediaItem> {
        let path = self.selected.clone()?;
        self.item_mut(&path).filter(|item| !item.busy)
    }

    fn item_mut(&mut self, path: &Path) -> Option<&mut MediaItem> {
        self.items.iter_mut().find(|item| item.path == path)
    }

    pub(crate) fn start_generate(&mut self) -> Option<PathBuf> {
        let item = self.idle_selected_mut()?;
        item.label.clear();
        item.last_error = None;
        item.begin(ClipStatus::Extracting, "Initializing label generation...");
        let path = item.path.clone();
        self.mark_dirty();
        Some(path)
    }

    pub(crate) fn apply_stage(&mut self, path: &Path, stage: Stage) {
        let Some(item) = self.item_mut(path).filter(|item| item.busy) else {
            return;
        };
        item.status = stage.into();
        item.status_text = match stage {
            Stage::Extracting => "Extracting audio...",
            Stage::Transcribing => "Transcribing audio...",
            Stage::Labeling => "Generating label...",
        }
        .to_string();
        self.mark_dirty();
    }

    pub(crate) fn apply_generated(&mut self, path: &Path, result: Result<String, TaskFailure>) {
        let Some(item) = self.item_mut(path) else {
            return;
        };
        match result {
            Ok(label) => {
                item.label = label;
                item.finish(
                    ClipStatus::Labeled,
                    "Label generated successfully.".to_string(),
                );
            }
            Err(failure) => item.fail(ClipStatus::Error, failure),
        }
        self.mark_dirty();
    }

    pub(crate) fn set_label(&mut self, text: String) {
        if let Some(item) = self.idle_selected_mut() {
            if item.label != text {
                item.label = text;
                self.mark_dirty();
            }
        }
    }

    /// Validates the candidate label and marks the selected item as saving.
    ///
    /// Returns the item path and trimmed label when a save should be started.
    pub(crate) fn start_save(&mut self) -> Option<(PathBuf, String)> {
        if self.renaming_in_flight() {
            return None;
        }
        let item = self.idle_selected_mut()?;
        let label = item.label.trim().to_string();
        if label.is_empty() {
            item.last_error = Some(TaskFailure::new(
                FailureKind::Validation,
                "Label cannot be empty.",
            ));
            item.status_text = "Error: Label cannot be empty.".to_string();
            self.mark_dirty();
            return None;
        }
        item.last_error = None;
        item.begin(ClipStatus::Saving, "Saving label...");
        let path = item.path.clone();
        self.mark_dirty();
        Some((path, label))
    }

    pub(crate) fn apply_saved(
        &mut self,
        path: &Path,
        result: Result<SavedFile, TaskFailure>,
    ) -> Option<PathBuf> {
        let index = self.items.iter().position(|item| item.path == path)?;
        self.mark_dirty();
        match result {
            Ok(saved) => {
                let label = self.items[index].label.clone();
                let mut replacement = MediaItem::new(saved.new_path.clone());
                replacement.label = label;
                replacement.status = ClipStatus::Saved;
                replacement.status_text = match &saved.warning {
                    Some(warning) => format!("Label saved ({warning})"),
                    None => "Label saved".to_string(),
                };
                self.replace_item(index, replacement);
                Some(saved.new_path)
            }
            Err(failure) => {
                self.items[index].fail(ClipStatus::Labeled, failure);
                None
            }
        }
    }

    pub(crate) fn start_revert(&mut self) -> Option<PathBuf> {
        if self.renaming_in_flight() {
            return None;
        }
        let item = self.idle_selected_mut()?;
        if !item.revertible {
            return None;
        }
        item.last_error = None;
        item.begin(ClipStatus::Reverting, "Reverting rename...");
        let path = item.path.clone();
        self.mark_dirty();
        Some(path)
    }

    pub(crate) fn apply_reverted(
        &mut self,
        path: &Path,
        result: Result<PathBuf, TaskFailure>,
    ) -> Option<PathBuf> {
        let index = self.items.iter().position(|item| item.path == path)?;
        self.mark_dirty();
        match result {
            Ok(original) => {
                let mut replacement = MediaItem::new(original.clone());
                replacement.status = ClipStatus::Reverted;
                replacement.status_text = "Reverted successfully.".to_string();
                self.replace_item(index, replacement);
                Some(original)
            }
            Err(failure) => {
                let item = &mut self.items[index];
                let resume = item.resume_status;
                item.fail(resume, failure);
                None
            }
        }
    }

    pub(crate) fn set_revertible(&mut self, path: &Path, tracked: bool) {
        if let Some(item) = self.item_mut(path) {
            if item.revertible != tracked {
                item.revertible = tracked;
                self.mark_dirty();
            }
        }
    }

    // Retires the old identity in place so list order and selection survive a rename.
    fn replace_item(&mut self, index: usize, replacement: MediaItem) {
        let old_path = std::mem::replace(&mut self.items[index], replacement).path;
        let new_path = self.items[index].path.clone();
        // A file already listed at the new location would otherwise appear twice.
        let mut position = 0;
        self.items.retain(|item| {
            let keep = position == index || item.path != new_path;
            position += 1;
            keep
        });
        if self.selected.as_deref() == Some(old_path.as_path()) {
            self.selected = Some(new_path);
        }
    }
}
