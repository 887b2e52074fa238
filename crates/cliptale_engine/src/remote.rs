use std::time::Duration;

use reqwest::StatusCode;

use crate::{RemoteError, RemoteErrorKind};

/// Connection settings for an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl RemoteSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, RemoteError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| RemoteError::call(format!("failed to build http client: {err}")))
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error, service: &str) -> RemoteError {
    if err.is_timeout() || err.is_connect() {
        return RemoteError::connectivity(format!(
            "Could not reach the {service} service. Check your connection and try again. ({err})"
        ));
    }
    if let Some(status) = err.status() {
        return status_error(status, service, &err.to_string());
    }
    RemoteError::call(format!("{service} request failed: {err}"))
}

pub(crate) fn status_error(status: StatusCode, service: &str, body: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::auth(format!(
            "Authentication with the {service} service failed ({status}). Please check LLM_API_KEY."
        )),
        _ => RemoteError::new(
            RemoteErrorKind::Call,
            format!("{service} service returned {status}: {}", truncate(body, 200)),
        ),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
