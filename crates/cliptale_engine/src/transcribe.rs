use std::path::Path;

use engine_logging::engine_info;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::runtime::Handle;

use crate::remote::{map_reqwest_error, status_error, RemoteSettings};
use crate::RemoteError;

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &Path) -> Result<String, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Calls `POST {base_url}/audio/transcriptions`.
///
/// Requests are driven on `runtime` with `Handle::block_on`, so `transcribe`
/// must be called from a blocking worker, never from inside an async task.
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    settings: RemoteSettings,
    model: String,
    client: reqwest::Client,
    runtime: Handle,
}

impl OpenAiTranscriber {
    pub fn new(
        settings: RemoteSettings,
        model: impl Into<String>,
        runtime: Handle,
    ) -> Result<Self, RemoteError> {
        let client = settings.build_client()?;
        Ok(Self {
            settings,
            model: model.into(),
            client,
            runtime,
        })
    }

    async fn request(&self, audio: &Path) -> Result<String, RemoteError> {
        let bytes = tokio::fs::read(audio).await.map_err(|err| {
            RemoteError::call(format!("failed to read audio {}: {err}", audio.display()))
        })?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        let mime = match audio.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mp3") => "audio/mpeg",
            _ => "audio/wav",
        };
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|err| RemoteError::call(err.to_string()))?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let response = self
            .client
            .post(self.settings.endpoint("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, "transcription"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, "transcription", &body));
        }
        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|err| map_reqwest_error(err, "transcription"))?;
        Ok(parsed.text.unwrap_or_default())
    }
}

impl Transcriber for OpenAiTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<String, RemoteError> {
        let text = self.runtime.block_on(self.request(audio))?;
        engine_info!(
            "Transcribed {:?} ({} chars) with {}",
            audio,
            text.len(),
            self.model
        );
        Ok(text)
    }
}
