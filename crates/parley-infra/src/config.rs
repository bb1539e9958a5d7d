//! Application configuration loader.
//!
//! Reads `parley.toml` from an explicit path or the search path
//! (`./parley.toml`, `configs/parley.toml`, `/etc/parley/parley.toml`) and
//! deserializes it into [`AppConfig`]. A missing file yields defaults;
//! validation rejects configurations the pipeline cannot run with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parley_types::backend::BackendMode;
use parley_types::config::{BackendSettings, OllamaSettings, OpenAiOptions, OpenAiSettings};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub bot: BotSection,
    pub genai: GenAiSection,
    pub ollama: OllamaSection,
    pub openai: OpenAiSection,
    pub messages: MessagesSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
    pub history_fetch_limit: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "parley.db".to_string(),
            history_fetch_limit: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotSection {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub allow_untrusted_chats: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            id: 0,
            username: "parley".to_string(),
            first_name: "Parley".to_string(),
            last_name: None,
            allow_untrusted_chats: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenAiSection {
    /// Backend provider, `ollama` or `openai`. Required.
    pub provider: Option<String>,
    pub mode: String,
    pub timeout_secs: u64,
    pub allow_concurrent: bool,
    /// Transcript template for completion mode.
    pub template: Option<String>,
}

impl Default for GenAiSection {
    fn default() -> Self {
        Self {
            provider: None,
            mode: "chat".to_string(),
            timeout_secs: 10,
            allow_concurrent: false,
            template: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub base_url: String,
    pub model: String,
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.3:70b".to_string(),
            options: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub reasoning_effort: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<String>,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1/".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            reasoning_effort: Some("medium".to_string()),
            temperature: Some(1.0),
            top_p: Some(1.0),
            max_tokens: None,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagesSection {
    pub private_chat_disallowed: String,
    pub internal_error: String,
    pub server_busy: String,
}

impl Default for MessagesSection {
    fn default() -> Self {
        let defaults = parley_core::orchestrator::ResponseMessages::default();
        Self {
            private_chat_disallowed: defaults.private_chat_disallowed,
            internal_error: defaults.internal_error,
            server_busy: defaults.server_busy,
        }
    }
}

const SEARCH_PATHS: [&str; 3] = ["parley.toml", "configs/parley.toml", "/etc/parley/parley.toml"];

impl AppConfig {
    /// Load configuration from an explicit path or the search path. A file
    /// missing from the search path is fine; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let content = match path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?,
            None => match Self::search() {
                Some((path, result)) => result.map_err(|source| ConfigError::Io { path, source })?,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    String::new()
                }
            },
        };

        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn search() -> Option<(PathBuf, Result<String, std::io::Error>)> {
        for candidate in SEARCH_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                tracing::debug!(path = candidate, "reading config file");
                return Some((path.to_path_buf(), std::fs::read_to_string(path)));
            }
        }
        None
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let provider = self
            .genai
            .provider
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("genai.provider is required".to_string()))?;
        if provider != "ollama" && provider != "openai" {
            return Err(ConfigError::Invalid(format!(
                "unknown genai.provider '{provider}'"
            )));
        }
        if provider == "openai" && self.openai.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::Invalid(
                "openai.api_key is required for the openai provider".to_string(),
            ));
        }

        let mode = self.mode()?;
        if mode == BackendMode::Completion && self.genai.template.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::Invalid(
                "genai.template is required for completion mode".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mode(&self) -> Result<BackendMode, ConfigError> {
        self.genai
            .mode
            .parse()
            .map_err(|e: String| ConfigError::Invalid(e))
    }

    pub fn genai_timeout(&self) -> Duration {
        Duration::from_secs(self.genai.timeout_secs)
    }

    /// sqlx connection URL for the configured database path.
    pub fn database_url(&self) -> String {
        if self.database.path.starts_with("sqlite:") {
            self.database.path.clone()
        } else {
            format!("sqlite://{}?mode=rwc", self.database.path)
        }
    }

    /// Global backend settings for the configured provider.
    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        match self.genai.provider.as_deref() {
            Some("ollama") => Ok(BackendSettings::Ollama(OllamaSettings {
                base_url: self.ollama.base_url.clone(),
                model: self.ollama.model.clone(),
                options: self.ollama.options.clone(),
            })),
            Some("openai") => Ok(BackendSettings::OpenAi(OpenAiSettings {
                base_url: self.openai.base_url.clone(),
                api_key: self.openai.api_key.clone().unwrap_or_default(),
                model: self.openai.model.clone(),
                options: OpenAiOptions {
                    frequency_penalty: self.openai.frequency_penalty,
                    presence_penalty: self.openai.presence_penalty,
                    reasoning_effort: self.openai.reasoning_effort.clone(),
                    temperature: self.openai.temperature,
                    top_p: self.openai.top_p,
                    max_tokens: self.openai.max_tokens,
                    stop: self.openai.stop.clone(),
                },
            })),
            other => Err(ConfigError::Invalid(format!(
                "unknown genai.provider '{}'",
                other.unwrap_or_default()
            ))),
        }
    }
}
