//! Chat and sender identity types.
//!
//! These model what the messaging transport hands the orchestrator for each
//! inbound message: which conversation it belongs to, who sent it, and an
//! optional reference to the message it replies to.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Kind of conversation a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatKind::Private => write!(f, "private"),
            ChatKind::Group => write!(f, "group"),
        }
    }
}

impl FromStr for ChatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(ChatKind::Private),
            "group" => Ok(ChatKind::Group),
            other => Err(format!("invalid chat kind: '{other}'")),
        }
    }
}

/// A conversation as identified by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub kind: ChatKind,
    /// Configured title (group chats; private chats usually have none).
    pub title: Option<String>,
}

/// The human who sent a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    /// First name plus last name when present.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// The bot's own identity, as reported by the transport.
///
/// Used to tag persisted assistant replies and to detect replies addressed
/// to the bot in group chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// A conversation permitted to use the bot beyond the restricted command
/// set. Administered out-of-band; read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedChat {
    pub chat_id: i64,
    pub chat_title: String,
}

/// Reference to the message an inbound message replies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliedMessage {
    pub sender_id: i64,
    pub text: String,
}

/// One inbound message as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat: ChatInfo,
    pub sender: Sender,
    pub text: String,
    pub reply_to: Option<RepliedMessage>,
}

impl IncomingMessage {
    /// Whether this message is a direct reply to one of the bot's messages.
    pub fn is_reply_to(&self, bot_id: i64) -> bool {
        self.reply_to
            .as_ref()
            .is_some_and(|r| r.sender_id == bot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(first: &str, last: Option<&str>) -> Sender {
        Sender {
            id: 7,
            username: Some("someone".to_string()),
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
        }
    }

    #[test]
    fn test_chat_kind_roundtrip() {
        for kind in [ChatKind::Private, ChatKind::Group] {
            let s = kind.to_string();
            let parsed: ChatKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_chat_kind_serde() {
        let json = serde_json::to_string(&ChatKind::Private).unwrap();
        assert_eq!(json, "\"private\"");
    }

    #[test]
    fn test_display_name_with_last_name() {
        assert_eq!(sender("Ada", Some("Lovelace")).display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_without_last_name() {
        assert_eq!(sender("Ada", None).display_name(), "Ada");
        assert_eq!(sender("Ada", Some("")).display_name(), "Ada");
    }

    #[test]
    fn test_is_reply_to_matches_bot_only() {
        let mut msg = IncomingMessage {
            chat: ChatInfo {
                id: 1,
                kind: ChatKind::Group,
                title: Some("lounge".to_string()),
            },
            sender: sender("Ada", None),
            text: "hello".to_string(),
            reply_to: Some(RepliedMessage {
                sender_id: 42,
                text: "earlier".to_string(),
            }),
        };

        assert!(msg.is_reply_to(42));
        assert!(!msg.is_reply_to(43));

        msg.reply_to = None;
        assert!(!msg.is_reply_to(42));
    }
}
