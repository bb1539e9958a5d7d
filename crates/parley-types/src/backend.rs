//! Backend request/response types.
//!
//! These model the interaction with a generative-text backend: the ordered
//! prompt messages sent in chat mode, the rendered prompt string sent in
//! completion mode, and the statistics returned alongside generated text.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::message::MessageRole;

/// Processing mode for backend invocations.
///
/// `Chat` sends the ordered message list; `Completion` sends a single
/// rendered transcript string against the raw completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Chat,
    Completion,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Chat => write!(f, "chat"),
            BackendMode::Completion => write!(f, "completion"),
        }
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(BackendMode::Chat),
            "completion" => Ok(BackendMode::Completion),
            other => Err(format!("invalid backend mode: '{other}'")),
        }
    }
}

/// One message in the ordered list sent to a chat-capable backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Generation statistics returned by a backend, used only for logging.
#[derive(Debug, Clone, Default)]
pub struct GenerationStats {
    pub done_reason: Option<String>,
    pub total_duration: Duration,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Raw text plus stats from one backend invocation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub stats: GenerationStats,
}

/// Errors from backend invocations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode backend response: {0}")]
    Deserialization(String),

    #[error("backend returned no choices")]
    EmptyChoices,

    #[error("provider '{provider}' does not support {mode} mode")]
    UnsupportedOperation { provider: String, mode: BackendMode },
}
