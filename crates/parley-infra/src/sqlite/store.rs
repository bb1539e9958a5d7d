//! SQLite chat store implementation.
//!
//! Implements `ChatStore` from `parley-core` using sqlx with split
//! read/write pools. Persists trusted chats, per-chat overrides, message
//! history, and the generation audit trail.

use chrono::{DateTime, Utc};
use parley_core::prompt::truncate_chars;
use parley_core::store::ChatStore;
use parley_types::chat::TrustedChat;
use parley_types::config::{ChatOverride, OverridePatch};
use parley_types::error::StoreError;
use parley_types::message::{GenerationRecord, MessageRole, NewMessage, StoredMessage};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatStore`.
#[derive(Clone)]
pub struct SqliteChatStore {
    pool: DatabasePool,
}

impl SqliteChatStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn override_row(&self, chat_id: Option<i64>) -> Result<ChatOverride, StoreError> {
        let row = sqlx::query(
            r#"SELECT chat_title, base_url, api_key, model, options, system_prompt
               FROM chat_overrides WHERE chat_id IS ?"#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => override_from_row(&row).map_err(|e| StoreError::Query(e.to_string())),
            None => Ok(ChatOverride::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct MessageRow {
    timestamp: String,
    chat_id: i64,
    chat_title: String,
    role: String,
    sender_id: i64,
    username: Option<String>,
    first_name: String,
    last_name: Option<String>,
    content: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            timestamp: row.try_get("timestamp")?,
            chat_id: row.try_get("chat_id")?,
            chat_title: row.try_get("chat_title")?,
            role: row.try_get("role")?,
            sender_id: row.try_get("sender_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            content: row.try_get("content")?,
        })
    }

    fn into_message(self) -> Result<StoredMessage, StoreError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;

        Ok(StoredMessage {
            timestamp: parse_datetime(&self.timestamp)?,
            chat_id: self.chat_id,
            chat_title: self.chat_title,
            role,
            sender_id: self.sender_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            content: self.content,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn override_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChatOverride, sqlx::Error> {
    Ok(ChatOverride {
        chat_title: row.try_get("chat_title")?,
        base_url: row.try_get("base_url")?,
        api_key: row.try_get("api_key")?,
        model: row.try_get("model")?,
        options: row.try_get("options")?,
        system_prompt: row.try_get("system_prompt")?,
    })
}

const CHAT_TITLE_MAX_CHARS: usize = 255;

/// Chat titles come from the transport unvalidated; clamp them at write.
fn clamp_title(title: &str) -> String {
    truncate_chars(title, CHAT_TITLE_MAX_CHARS)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ChatStore impl
// ---------------------------------------------------------------------------

impl ChatStore for SqliteChatStore {
    async fn is_trusted(&self, chat_id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM trusted_chats WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn trust_chat(&self, chat_id: i64, chat_title: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO trusted_chats (chat_id, chat_title) VALUES (?, ?)
               ON CONFLICT(chat_id) DO UPDATE SET chat_title = excluded.chat_title"#,
        )
        .bind(chat_id)
        .bind(clamp_title(chat_title))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn untrust_chat(&self, chat_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM trusted_chats WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn trusted_chats(&self) -> Result<Vec<TrustedChat>, StoreError> {
        let rows = sqlx::query("SELECT chat_id, chat_title FROM trusted_chats ORDER BY chat_id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(TrustedChat {
                chat_id: row
                    .try_get("chat_id")
                    .map_err(|e| StoreError::Query(e.to_string()))?,
                chat_title: row
                    .try_get("chat_title")
                    .map_err(|e| StoreError::Query(e.to_string()))?,
            });
        }
        Ok(chats)
    }

    async fn get_override(&self, chat_id: i64) -> Result<ChatOverride, StoreError> {
        let global = self.override_row(None).await?;
        let specific = self.override_row(Some(chat_id)).await?;
        Ok(global.overlaid_with(&specific))
    }

    async fn set_override(
        &self,
        chat_id: Option<i64>,
        patch: &OverridePatch,
    ) -> Result<(), StoreError> {
        // Select-then-write; the single-connection writer pool serializes
        // this with any concurrent upsert. A plain ON CONFLICT upsert cannot
        // target the global row because UNIQUE(chat_id) ignores NULLs.
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM chat_overrides WHERE chat_id IS ?")
                .bind(chat_id)
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;

        match existing {
            Some((id,)) => {
                sqlx::query(
                    r#"UPDATE chat_overrides SET
                           chat_title = COALESCE(?, chat_title),
                           base_url = COALESCE(?, base_url),
                           api_key = COALESCE(?, api_key),
                           model = COALESCE(?, model),
                           options = COALESCE(?, options),
                           system_prompt = COALESCE(?, system_prompt)
                       WHERE id = ?"#,
                )
                .bind(patch.chat_title.as_deref().map(clamp_title))
                .bind(&patch.base_url)
                .bind(&patch.api_key)
                .bind(&patch.model)
                .bind(&patch.options)
                .bind(&patch.system_prompt)
                .bind(id)
                .execute(&self.pool.writer)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
            }
            None => {
                sqlx::query(
                    r#"INSERT INTO chat_overrides
                       (chat_id, chat_title, base_url, api_key, model, options, system_prompt)
                       VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(chat_id)
                .bind(patch.chat_title.as_deref().map(clamp_title))
                .bind(&patch.base_url)
                .bind(&patch.api_key)
                .bind(&patch.model)
                .bind(&patch.options)
                .bind(&patch.system_prompt)
                .execute(&self.pool.writer)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn delete_override(&self, chat_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_overrides WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO messages
               (timestamp, chat_id, chat_title, role, sender_id, username,
                first_name, last_name, content)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(message.chat_id)
        .bind(clamp_title(&message.chat_title))
        .bind(message.role.to_string())
        .bind(message.sender_id)
        .bind(&message.username)
        .bind(&message.first_name)
        .bind(&message.last_name)
        .bind(&message.content)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        chat_id: i64,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages WHERE chat_id = ?
               ORDER BY id DESC LIMIT ?"#,
        )
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut msgs = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = MessageRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            msgs.push(r.into_message()?);
        }
        // Fetched newest-first for the LIMIT; callers want chronological.
        msgs.reverse();
        Ok(msgs)
    }

    async fn clear_messages(&self, chat_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn record_generation(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO generation_requests
               (timestamp, chat_id, chat_title, sender_id, username, model,
                options, prompt, base_url)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(record.chat_id)
        .bind(clamp_title(&record.chat_title))
        .bind(record.sender_id)
        .bind(&record.username)
        .bind(&record.model)
        .bind(&record.options)
        .bind(&record.prompt)
        .bind(&record.base_url)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteChatStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteChatStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn make_message(chat_id: i64, content: &str) -> NewMessage {
        NewMessage {
            chat_id,
            chat_title: "Rust Lounge".to_string(),
            role: MessageRole::User,
            sender_id: 7,
            username: Some("ada".to_string()),
            first_name: "Ada".to_string(),
            last_name: None,
            content: content.to_string(),
        }
    }

    // -- Trusted chats --

    #[tokio::test]
    async fn test_trust_and_untrust() {
        let store = test_store().await;

        assert!(!store.is_trusted(100).await.unwrap());
        store.trust_chat(100, "Rust Lounge").await.unwrap();
        assert!(store.is_trusted(100).await.unwrap());

        // Idempotent re-trust updates the title
        store.trust_chat(100, "Rustaceans").await.unwrap();
        let chats = store.trusted_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].chat_title, "Rustaceans");

        assert!(store.untrust_chat(100).await.unwrap());
        assert!(!store.is_trusted(100).await.unwrap());
        assert!(!store.untrust_chat(100).await.unwrap());
    }

    // -- Overrides --

    #[tokio::test]
    async fn test_override_missing_rows_yield_empty() {
        let store = test_store().await;
        let ov = store.get_override(100).await.unwrap();
        assert!(ov.is_empty());
    }

    #[tokio::test]
    async fn test_override_overlays_global_with_chat_row() {
        let store = test_store().await;

        store
            .set_override(
                None,
                &OverridePatch {
                    model: Some("llama3.3:70b".to_string()),
                    system_prompt: Some("global prompt".to_string()),
                    ..OverridePatch::default()
                },
            )
            .await
            .unwrap();
        store
            .set_override(
                Some(100),
                &OverridePatch {
                    model: Some("qwen3:32b".to_string()),
                    ..OverridePatch::default()
                },
            )
            .await
            .unwrap();

        let ov = store.get_override(100).await.unwrap();
        assert_eq!(ov.model.as_deref(), Some("qwen3:32b"));
        assert_eq!(ov.system_prompt.as_deref(), Some("global prompt"));

        // Another chat only sees the global row
        let other = store.get_override(200).await.unwrap();
        assert_eq!(other.model.as_deref(), Some("llama3.3:70b"));
    }

    #[tokio::test]
    async fn test_override_patch_leaves_absent_fields() {
        let store = test_store().await;

        store
            .set_override(Some(100), &OverridePatch::system_prompt("be terse"))
            .await
            .unwrap();
        store
            .set_override(
                Some(100),
                &OverridePatch {
                    model: Some("qwen3:32b".to_string()),
                    ..OverridePatch::default()
                },
            )
            .await
            .unwrap();

        let ov = store.get_override(100).await.unwrap();
        assert_eq!(ov.system_prompt.as_deref(), Some("be terse"));
        assert_eq!(ov.model.as_deref(), Some("qwen3:32b"));
    }

    #[tokio::test]
    async fn test_global_override_updates_single_row() {
        let store = test_store().await;

        store
            .set_override(None, &OverridePatch::system_prompt("first"))
            .await
            .unwrap();
        store
            .set_override(None, &OverridePatch::system_prompt("second"))
            .await
            .unwrap();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_overrides WHERE chat_id IS NULL")
                .fetch_one(&store.pool.reader)
                .await
                .unwrap();
        assert_eq!(count.0, 1);

        let ov = store.get_override(100).await.unwrap();
        assert_eq!(ov.system_prompt.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_delete_override() {
        let store = test_store().await;

        store
            .set_override(Some(100), &OverridePatch::system_prompt("be terse"))
            .await
            .unwrap();
        assert!(store.delete_override(100).await.unwrap());
        assert!(!store.delete_override(100).await.unwrap());

        let ov = store.get_override(100).await.unwrap();
        assert!(ov.system_prompt.is_none());
    }

    // -- Messages --

    #[tokio::test]
    async fn test_recent_messages_chronological_with_limit() {
        let store = test_store().await;

        for i in 1..=5 {
            store
                .append_message(&make_message(100, &format!("message {i}")))
                .await
                .unwrap();
        }

        let messages = store.recent_messages(100, 3).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "message 3");
        assert_eq!(messages[1].content, "message 4");
        assert_eq!(messages[2].content, "message 5");
    }

    #[tokio::test]
    async fn test_message_fields_roundtrip() {
        let store = test_store().await;
        store.append_message(&make_message(100, "hello")).await.unwrap();

        let messages = store.recent_messages(100, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.chat_id, 100);
        assert_eq!(msg.chat_title, "Rust Lounge");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.sender_id, 7);
        assert_eq!(msg.username.as_deref(), Some("ada"));
        assert_eq!(msg.first_name, "Ada");
        assert!(msg.last_name.is_none());
    }

    #[tokio::test]
    async fn test_clear_messages_scoped_to_chat() {
        let store = test_store().await;

        store.append_message(&make_message(100, "a")).await.unwrap();
        store.append_message(&make_message(100, "b")).await.unwrap();
        store.append_message(&make_message(200, "c")).await.unwrap();

        let deleted = store.clear_messages(100).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(store.recent_messages(100, 10).await.unwrap().is_empty());
        assert_eq!(store.recent_messages(200, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_title_clamped_at_write() {
        let store = test_store().await;

        let long_title = "t".repeat(400);
        store.trust_chat(100, &long_title).await.unwrap();

        let chats = store.trusted_chats().await.unwrap();
        assert_eq!(chats[0].chat_title.chars().count(), 255);
    }

    // -- Generation records --

    #[tokio::test]
    async fn test_record_generation() {
        let store = test_store().await;

        store
            .record_generation(&GenerationRecord {
                chat_id: 100,
                chat_title: "Rust Lounge".to_string(),
                sender_id: 7,
                username: Some("ada".to_string()),
                model: "llama3.3:70b".to_string(),
                options: "{}".to_string(),
                prompt: "[]".to_string(),
                base_url: "http://localhost:11434".to_string(),
            })
            .await
            .unwrap();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM generation_requests WHERE chat_id = 100")
                .fetch_one(&store.pool.reader)
                .await
                .unwrap();
        assert_eq!(count.0, 1);
    }
}
