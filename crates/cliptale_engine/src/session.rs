//! Per-file labeling workflow: extract audio, transcribe, label, rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::extract::AudioExtractor;
use crate::filename::{sanitize_label, RenameTemplate};
use crate::journal::{rename_guard, resolve_path, RenameJournal};
use crate::label::LabelGenerator;
use crate::transcribe::Transcriber;
use crate::{
    SessionError, SessionStatus, Stage, SUPPORTED_AUDIO_EXTENSIONS, SUPPORTED_VIDEO_EXTENSIONS,
};

/// Stage update emitted while [`LabelingSession::generate`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub path: PathBuf,
    pub stage: Stage,
}

pub trait ProgressSink: Send + Sync {
    fn stage(&self, path: &Path, stage: Stage);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<SessionProgress>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<SessionProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn stage(&self, path: &Path, stage: Stage) {
        let _ = self.tx.send(SessionProgress {
            path: path.to_path_buf(),
            stage,
        });
    }
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn stage(&self, _path: &Path, _stage: Stage) {}
}

/// The external services a session delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub labeler: Arc<dyn LabelGenerator>,
}

/// One labeling workflow for one source file.
///
/// `status` and `label` describe this session only. A runner typically builds
/// a session per task and drops it afterwards; the long-lived per-item state
/// belongs to the caller (`cliptale_core::ClipStatus` in the app).
#[derive(Debug)]
pub struct LabelingSession {
    source: PathBuf,
    duration_limit_s: u32,
    template: Option<RenameTemplate>,
    status: SessionStatus,
    label: Option<String>,
}

impl LabelingSession {
    pub fn new(path: impl AsRef<Path>, duration_limit_s: u32) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if duration_limit_s == 0 {
            return Err(SessionError::InvalidDuration);
        }
        check_video_extension(path)?;
        if !path.is_file() {
            return Err(SessionError::SourceNotFound(path.to_path_buf()));
        }
        let source =
            resolve_path(path).map_err(|_| SessionError::SourceNotFound(path.to_path_buf()))?;
        Ok(Self {
            source,
            duration_limit_s,
            template: None,
            status: SessionStatus::New,
            label: None,
        })
    }

    pub fn set_template(&mut self, template: &str) -> Result<(), SessionError> {
        self.template = Some(RenameTemplate::parse(template)?);
        Ok(())
    }

    pub fn with_template(mut self, template: RenameTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Runs extraction, transcription and label generation in order.
    ///
    /// The first failing step ends the chain and leaves the session in `Error`.
    pub fn generate(
        &mut self,
        collaborators: &Collaborators,
        progress: &dyn ProgressSink,
    ) -> Result<String, SessionError> {
        match self.run_chain(collaborators, progress) {
            Ok(label) => {
                self.status = SessionStatus::Labeled;
                self.label = Some(label.clone());
                engine_info!("Labeled {:?} as {:?}", self.source, label);
                Ok(label)
            }
            Err(err) => {
                self.status = SessionStatus::Error;
                engine_warn!("Labeling {:?} failed: {}", self.source, err);
                Err(err)
            }
        }
    }

    fn run_chain(
        &mut self,
        collaborators: &Collaborators,
        progress: &dyn ProgressSink,
    ) -> Result<String, SessionError> {
        self.enter(Stage::Extracting, progress);
        let artifact = collaborators
            .extractor
            .extract(&self.source, 0, self.duration_limit_s)?;
        let audio = artifact.path();
        if !audio.is_file() {
            return Err(SessionError::AudioMissing(audio.to_path_buf()));
        }
        check_audio_extension(audio)?;

        self.enter(Stage::Transcribing, progress);
        let transcript = collaborators
            .transcriber
            .transcribe(audio)
            .map_err(SessionError::Transcription)?;
        engine_debug!("Transcript for {:?}: {} chars", self.source, transcript.len());

        self.enter(Stage::Labeling, progress);
        let label = collaborators
            .labeler
            .generate(&transcript)
            .map_err(SessionError::Labeling)?;
        Ok(label.trim().to_string())
    }

    fn enter(&mut self, stage: Stage, progress: &dyn ProgressSink) {
        self.status = stage.into();
        engine_debug!("{:?}: {}", self.source, stage);
        progress.stage(&self.source, stage);
    }

    /// Renames the source after `label` and journals the rename.
    ///
    /// Validation happens before any filesystem access. Once the rename has
    /// happened the session follows the file to its new path, even if the
    /// journal write then fails.
    pub fn save(&mut self, label: &str, journal: &RenameJournal) -> Result<PathBuf, SessionError> {
        let template = self.template.clone().ok_or(SessionError::NoTemplate)?;
        if label.trim().is_empty() || sanitize_label(label).is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        let label = label.trim();

        let previous = self.status;
        self.status = SessionStatus::Saving;
        match self.rename_and_record(&template, label, journal) {
            Ok(new_path) => {
                self.status = SessionStatus::Saved;
                self.label = Some(label.to_string());
                Ok(new_path)
            }
            Err(err @ SessionError::JournalWrite { .. }) => {
                self.status = SessionStatus::Saved;
                self.label = Some(label.to_string());
                Err(err)
            }
            Err(err) => {
                self.status = match previous {
                    SessionStatus::Saved => SessionStatus::Saved,
                    _ => SessionStatus::Labeled,
                };
                Err(err)
            }
        }
    }

    fn rename_and_record(
        &mut self,
        template: &RenameTemplate,
        label: &str,
        journal: &RenameJournal,
    ) -> Result<PathBuf, SessionError> {
        let destination = template.destination(label, &self.source);
        let _rename = rename_guard();
        if destination.exists() {
            return Err(SessionError::DestinationExists(destination));
        }
        if journal.is_tracked(&destination) {
            return Err(SessionError::JournalConflict(destination));
        }

        fs::rename(&self.source, &destination).map_err(|source| SessionError::Rename {
            from: self.source.clone(),
            to: destination.clone(),
            source,
        })?;
        engine_info!("Renamed {:?} -> {:?}", self.source, destination);

        let original = std::mem::replace(&mut self.source, destination.clone());
        journal
            .record(&original, &destination)
            .map_err(|source| SessionError::JournalWrite {
                new_path: destination.clone(),
                source,
            })?;
        Ok(destination)
    }
}

fn check_video_extension(path: &Path) -> Result<(), SessionError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(());
    }
    Err(SessionError::UnsupportedExtension {
        extension: if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{extension}")
        },
        supported: SUPPORTED_VIDEO_EXTENSIONS
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn check_audio_extension(path: &Path) -> Result<(), SessionError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(SessionError::UnsupportedAudioFormat(format!(".{extension}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(check_video_extension(Path::new("a/clip.MOV")).is_ok());
        let err = check_video_extension(Path::new("a/clip.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "Video extension not supported: .txt, supported formats are: .mp4, .avi, .mov, .mkv"
        );
    }

    #[test]
    fn duration_is_validated_before_the_filesystem() {
        let err = LabelingSession::new("/no/such/clip.mp4", 0).unwrap_err();
        assert!(matches!(err, SessionError::InvalidDuration));
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = LabelingSession::new(dir.path().join("clip.mp4"), 15).unwrap_err();
        assert!(matches!(err, SessionError::SourceNotFound(_)));
    }
}
