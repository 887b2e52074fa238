use engine_logging::engine_info;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::remote::{map_reqwest_error, status_error, RemoteSettings};
use crate::RemoteError;

pub const DEFAULT_LABEL_MODEL: &str = "gpt-4o-mini";

const LABEL_INSTRUCTIONS: &str = "You name video clips from a transcript of their audio. \
Reply with a single short label of at most five words in lowercase snake_case, \
describing what the clip is about. Reply with the label only.";

pub trait LabelGenerator: Send + Sync {
    fn generate(&self, transcript: &str) -> Result<String, RemoteError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Asks a chat-completions endpoint for a label.
///
/// Like [`crate::OpenAiTranscriber`], blocks on `runtime` and must run on a worker.
#[derive(Debug, Clone)]
pub struct OpenAiLabeler {
    settings: RemoteSettings,
    model: String,
    client: reqwest::Client,
    runtime: Handle,
}

impl OpenAiLabeler {
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

    async fn request(&self, transcript: &str) -> Result<String, RemoteError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: LABEL_INSTRUCTIONS,
                },
                ChatMessage {
                    role: "user",
                    content: transcript,
                },
            ],
            temperature: 0.2,
        };
        let response = self
            .client
            .post(self.settings.endpoint("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, "labeling"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, "labeling", &body));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| map_reqwest_error(err, "labeling"))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RemoteError::call("labeling service returned no choices"))?;
        Ok(clean_reply(&content))
    }
}

impl LabelGenerator for OpenAiLabeler {
    fn generate(&self, transcript: &str) -> Result<String, RemoteError> {
        let label = self.runtime.block_on(self.request(transcript))?;
        engine_info!("Generated label {:?} with {}", label, self.model);
        Ok(label)
    }
}

// Models like to wrap the answer in quotes or backticks.
fn clean_reply(reply: &str) -> String {
    reply
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .trim_matches(&['"', '\'', '`'][..])
        .trim()
        .to_string()
}
