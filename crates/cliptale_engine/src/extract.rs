use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use engine_logging::{engine_debug, engine_info};
use tempfile::TempDir;

use crate::ExtractError;

/// An extracted audio file.
///
/// When produced by [`FfmpegExtractor`] it lives in a private temporary
/// directory that is removed when the artifact is dropped.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    _workspace: Option<TempDir>,
}

impl AudioArtifact {
    /// Artifact at a caller-owned location; nothing is cleaned up on drop.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _workspace: None,
        }
    }

    fn in_workspace(path: PathBuf, workspace: TempDir) -> Self {
        Self {
            path,
            _workspace: Some(workspace),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub trait AudioExtractor: Send + Sync {
    /// Extracts `duration_s` seconds of audio starting `start_s` seconds into `source`.
    fn extract(
        &self,
        source: &Path,
        start_s: u32,
        duration_s: u32,
    ) -> Result<AudioArtifact, ExtractError>;
}

/// Runs the `ffmpeg` binary to produce a mono 16 kHz WAV file.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(
        &self,
        source: &Path,
        start_s: u32,
        duration_s: u32,
    ) -> Result<AudioArtifact, ExtractError> {
        if !source.is_file() {
            return Err(ExtractError::SourceMissing(source.to_path_buf()));
        }
        let workspace = tempfile::Builder::new()
            .prefix("cliptale-audio-")
            .tempdir()
            .map_err(ExtractError::Workspace)?;
        let output = workspace.path().join("audio.wav");

        engine_debug!(
            "Extracting [{}s, {}s) of {:?} to {:?}",
            start_s,
            start_s.saturating_add(duration_s),
            source,
            output
        );
        let result = Command::new(&self.program)
            .arg("-y")
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-ss")
            .arg(start_s.to_string())
            .arg("-t")
            .arg(duration_s.to_string())
            .arg("-i")
            .arg(source)
            .args(["-vn", "-ac", "1", "-ar", "16000"])
            .arg(&output)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExtractError::Launch {
                program: self.program_name(),
                source,
            })?;

        if !result.status.success() {
            return Err(ExtractError::Failed {
                program: self.program_name(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.is_file() {
            return Err(ExtractError::NoOutput(output));
        }

        engine_info!("Extracted audio from {:?}", source);
        Ok(AudioArtifact::in_workspace(output, workspace))
    }
}
