//! User configuration stored as RON next to the rename journal.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cliptale_engine::{
    write_atomic, PersistError, RemoteSettings, DEFAULT_DURATION_LIMIT_S, DEFAULT_LABEL_MODEL,
    DEFAULT_TRANSCRIPTION_MODEL, JOURNAL_DIR, MIN_WORKERS,
};
use engine_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "config.ron";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const ENV_BASE_URL: &str = "LLM_BASE_URL";
pub const ENV_API_KEY: &str = "LLM_API_KEY";
pub const ENV_MODEL_NAME: &str = "LLM_MODEL_NAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory could not be determined")]
    NoHomeDir,
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
    #[error("failed to write config: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub duration_limit_s: u32,
    /// `None` renames to `{label}.<original extension>`.
    pub rename_template: Option<String>,
    pub workers: usize,
    pub ffmpeg_path: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub transcription_model: String,
    pub request_timeout_s: u64,
    pub journal_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            duration_limit_s: DEFAULT_DURATION_LIMIT_S,
            rename_template: None,
            workers: MIN_WORKERS,
            ffmpeg_path: "ffmpeg".to_string(),
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_model: DEFAULT_LABEL_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            request_timeout_s: 60,
            journal_path: None,
        }
    }
}

impl AppConfig {
    /// `~/.cliptale/config.ron`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(JOURNAL_DIR).join(CONFIG_FILENAME))
    }

    /// Reads `path`, falling back to defaults when it is missing or unusable.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                engine_warn!("Failed to read config from {:?}: {}", path, err);
                return Self::default();
            }
        };

        let config: AppConfig = match ron::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                engine_warn!("Failed to parse config from {:?}: {}", path, err);
                return Self::default();
            }
        };

        engine_info!("Loaded config from {:?}", path);
        config.validated()
    }

    /// Loads `path`, writing the defaults there first if the file does not exist.
    pub fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => engine_info!("Wrote default config to {:?}", path),
                Err(err) => engine_warn!("Could not write default config to {:?}: {}", path, err),
            }
            return config;
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(self, pretty)?;
        write_atomic(path, &content)?;
        Ok(())
    }

    /// Applies `LLM_BASE_URL` and `LLM_MODEL_NAME` from `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.llm_base_url = url.trim().to_string();
        }
        if let Some(model) = lookup(ENV_MODEL_NAME).filter(|v| !v.trim().is_empty()) {
            self.llm_model = model.trim().to_string();
        }
    }

    pub fn remote_settings(&self, api_key: String) -> RemoteSettings {
        let mut settings = RemoteSettings::new(self.llm_base_url.clone(), api_key);
        settings.request_timeout = Duration::from_secs(self.request_timeout_s.max(1));
        settings
    }

    fn validated(mut self) -> Self {
        if self.duration_limit_s == 0 {
            engine_warn!(
                "duration_limit_s must be positive, using {}",
                DEFAULT_DURATION_LIMIT_S
            );
            self.duration_limit_s = DEFAULT_DURATION_LIMIT_S;
        }
        self
    }
}

/// The API key is never stored in the config file.
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup(ENV_API_KEY)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}
