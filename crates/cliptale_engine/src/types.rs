use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::journal::JournalError;

/// Video containers a session accepts, lowercase and without the dot.
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Audio formats the transcription step accepts.
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3"];

/// Default number of seconds sampled from the start of a clip.
pub const DEFAULT_DURATION_LIMIT_S: u32 = 15;

/// Stages of the generate chain, reported through a [`crate::ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Transcribing,
    Labeling,
}

/// State of a [`crate::LabelingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    New,
    Extracting,
    Transcribing,
    Labeling,
    Labeled,
    Saving,
    Saved,
    Error,
}

impl From<Stage> for SessionStatus {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Extracting => SessionStatus::Extracting,
            Stage::Transcribing => SessionStatus::Transcribing,
            Stage::Labeling => SessionStatus::Labeling,
        }
    }
}

/// Broad classification callers branch on instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Io,
    Extraction,
    Auth,
    Connectivity,
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Auth,
    Connectivity,
    Call,
}

/// Failure of a transcription or label-generation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Auth, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Connectivity, message)
    }

    pub fn call(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Call, message)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),
    #[error("could not create a workspace for extracted audio: {0}")]
    Workspace(#[source] io::Error),
    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("extraction produced no audio at {0}")]
    NoOutput(PathBuf),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Video file not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Video extension not supported: {extension}, supported formats are: {supported}")]
    UnsupportedExtension { extension: String, supported: String },
    #[error("Duration limit must be positive")]
    InvalidDuration,
    #[error("No rename template set")]
    NoTemplate,
    #[error("Template must contain '{{label}}' placeholder")]
    InvalidTemplate,
    #[error("Label cannot be empty.")]
    EmptyLabel,
    #[error("{0}")]
    Extraction(#[from] ExtractError),
    #[error("Audio file not found: {0}")]
    AudioMissing(PathBuf),
    #[error("Unsupported audio format: {0}. Supported formats are .wav and .mp3.")]
    UnsupportedAudioFormat(String),
    #[error("{0}")]
    Transcription(RemoteError),
    #[error("{0}")]
    Labeling(RemoteError),
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),
    #[error("destination is already tracked by the rename journal: {0}")]
    JournalConflict(PathBuf),
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("renamed to {new_path} but the rename could not be journaled: {source}")]
    JournalWrite {
        new_path: PathBuf,
        #[source]
        source: JournalError,
    },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::UnsupportedExtension { .. }
            | SessionError::InvalidDuration
            | SessionError::NoTemplate
            | SessionError::InvalidTemplate
            | SessionError::EmptyLabel
            | SessionError::UnsupportedAudioFormat(_) => ErrorKind::Validation,
            SessionError::SourceNotFound(_)
            | SessionError::AudioMissing(_)
            | SessionError::DestinationExists(_)
            | SessionError::JournalConflict(_)
            | SessionError::Rename { .. }
            | SessionError::JournalWrite { .. } => ErrorKind::Io,
            SessionError::Extraction(_) => ErrorKind::Extraction,
            SessionError::Transcription(err) | SessionError::Labeling(err) => match err.kind {
                RemoteErrorKind::Auth => ErrorKind::Auth,
                RemoteErrorKind::Connectivity => ErrorKind::Connectivity,
                RemoteErrorKind::Call => ErrorKind::Call,
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extracting => "extracting",
            Stage::Transcribing => "transcribing",
            Stage::Labeling => "labeling",
        };
        f.write_str(name)
    }
}
