//! ClipTale engine: file labeling, rename journal and background task execution.
mod extract;
mod filename;
mod journal;
mod label;
mod orchestrator;
mod persist;
mod remote;
mod revert;
mod session;
mod transcribe;
mod types;

pub use extract::{AudioArtifact, AudioExtractor, FfmpegExtractor};
pub use filename::{sanitize_label, RenameTemplate, LABEL_PLACEHOLDER};
pub use journal::{resolve_path, JournalError, RenameJournal, JOURNAL_DIR, JOURNAL_FILENAME};
pub use label::{LabelGenerator, OpenAiLabeler, DEFAULT_LABEL_MODEL};
pub use orchestrator::{TaskError, TaskHandle, TaskId, TaskOrchestrator, TaskPoll, MIN_WORKERS};
pub use persist::{ensure_dir, write_atomic, PersistError};
pub use remote::RemoteSettings;
pub use revert::{revert, RevertError, RevertOutcome};
pub use session::{
    ChannelProgressSink, Collaborators, LabelingSession, NoopProgress, ProgressSink,
    SessionProgress,
};
pub use transcribe::{OpenAiTranscriber, Transcriber, DEFAULT_TRANSCRIPTION_MODEL};
pub use types::{
    ErrorKind, ExtractError, RemoteError, RemoteErrorKind, SessionError, SessionStatus, Stage,
    DEFAULT_DURATION_LIMIT_S, SUPPORTED_AUDIO_EXTENSIONS, SUPPORTED_VIDEO_EXTENSIONS,
};
