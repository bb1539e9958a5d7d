//! Chat store trait definition.
//!
//! Defines the storage interface for trusted-chat membership, per-chat
//! configuration overrides, message history, and generation audit records.
//! The infrastructure layer (parley-infra) implements this trait with
//! SQLite persistence.

use parley_types::chat::TrustedChat;
use parley_types::config::{ChatOverride, OverridePatch};
use parley_types::error::StoreError;
use parley_types::message::{GenerationRecord, NewMessage, StoredMessage};

/// Storage interface consumed by the orchestration pipeline.
///
/// Covers four record families:
/// - **Trusted chats:** membership checks plus administrative mutation.
/// - **Overrides:** one optional row per chat plus one global (null-id) row.
/// - **Messages:** the append-only per-chat history log.
/// - **Generation records:** a write-only audit trail of backend calls.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ChatStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Trusted chats
    // -----------------------------------------------------------------------

    /// Whether the chat may use the bot beyond the restricted command set.
    fn is_trusted(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Mark a chat as trusted (idempotent upsert).
    fn trust_chat(
        &self,
        chat_id: i64,
        chat_title: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Remove a chat from the trusted set. Returns `true` if it was trusted.
    fn untrust_chat(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// List all trusted chats.
    fn trusted_chats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<TrustedChat>, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Overrides
    // -----------------------------------------------------------------------

    /// Get the effective override for a chat: the global (null-id) row
    /// overlaid field-wise by the chat-specific row. Returns an all-empty
    /// override when neither row exists.
    fn get_override(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<ChatOverride, StoreError>> + Send;

    /// Upsert override fields for a chat, or for the global row when
    /// `chat_id` is `None`. Absent patch fields leave stored values
    /// unchanged.
    fn set_override(
        &self,
        chat_id: Option<i64>,
        patch: &OverridePatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a chat's override row. Returns `true` if a row existed.
    fn delete_override(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Append one message to a chat's history. The store assigns the
    /// timestamp at write time.
    fn append_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// The most recent `limit` messages for a chat, returned oldest-first.
    fn recent_messages(
        &self,
        chat_id: i64,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, StoreError>> + Send;

    /// Delete a chat's entire history. Returns the number of rows removed.
    fn clear_messages(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Generation records
    // -----------------------------------------------------------------------

    /// Record one backend invocation for the audit trail. Callers treat
    /// failures as best-effort (log and continue).
    fn record_generation(
        &self,
        record: &GenerationRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
