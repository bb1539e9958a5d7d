//! Persisted message and audit-record types.
//!
//! Messages form an append-only per-chat log; generation records are a
//! write-only audit trail of backend invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A message row as read back from the store, oldest-first in history
/// queries. The timestamp is assigned by the store at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub timestamp: DateTime<Utc>,
    pub chat_id: i64,
    pub chat_title: String,
    pub role: MessageRole,
    pub sender_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub content: String,
}

/// A message to append to a chat's history.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub chat_title: String,
    pub role: MessageRole,
    pub sender_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub content: String,
}

/// Audit record of one backend invocation. Write-only; never read back by
/// the pipeline.
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub chat_id: i64,
    pub chat_title: String,
    pub sender_id: i64,
    pub username: Option<String>,
    /// Model actually used after override resolution.
    pub model: String,
    /// Resolved backend options, serialized as JSON.
    pub options: String,
    /// The rendered prompt (completion mode) or JSON message list (chat mode).
    pub prompt: String,
    /// Resolved backend base URL.
    pub base_url: String,
}
