//! Per-message orchestration state machine.
//!
//! Ties the pipeline together for one inbound message: permission gating,
//! history load, inbound persistence, eligibility, overlay resolution,
//! prompt assembly, gated backend invocation, post-processing, delivery,
//! and assistant persistence. Safe to invoke concurrently for different
//! chats; the generation gate is the only shared mutable resource.
//!
//! Every turn-level error is caught here and converted to one of three
//! user-visible outcomes (denial, busy, or a generic internal error); raw
//! detail goes to the logs only.

use chrono::Utc;
use parley_types::backend::{BackendError, BackendMode, PromptMessage};
use parley_types::chat::{BotIdentity, ChatKind, IncomingMessage};
use parley_types::config::{BackendSettings, OverridePatch};
use parley_types::error::{OverlayError, StoreError};
use parley_types::message::{GenerationRecord, MessageRole, NewMessage};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backend::{BackendFactory, GenerativeBackend};
use crate::command::Command;
use crate::gate::GenerationGate;
use crate::overlay;
use crate::prompt::{self, RenderError};
use crate::store::ChatStore;
use crate::transport::Transport;

/// Upper bound on a stored system-prompt override.
pub const SYSTEM_PROMPT_MAX_BYTES: usize = 8 * 1024;

/// Everything up to and including this marker is discarded from responses.
const REASONING_END_MARKER: &str = "</think>";

/// A response of exactly this text means the model chose not to reply.
const SKIP_MARKER: &str = "<skip>";

/// User-visible reply texts for the three failure outcomes.
#[derive(Debug, Clone)]
pub struct ResponseMessages {
    pub private_chat_disallowed: String,
    pub internal_error: String,
    pub server_busy: String,
}

impl Default for ResponseMessages {
    fn default() -> Self {
        Self {
            private_chat_disallowed: "This bot is not available in private chats.".to_string(),
            internal_error: "An internal error has occurred. Please try again later."
                .to_string(),
            server_busy: "The server is currently busy. Please try again later.".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub bot: BotIdentity,
    pub mode: BackendMode,
    pub global_backend: BackendSettings,
    /// Transcript template; required when `mode` is `Completion`.
    pub completion_template: Option<String>,
    pub history_limit: u32,
    pub allow_untrusted_chats: bool,
    pub messages: ResponseMessages,
}

/// Terminal state of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A reply was delivered.
    Replied,
    /// No reply was warranted; the turn is still a success.
    Suppressed,
    /// The chat is not permitted to use the bot.
    Denied,
    /// The generation slot was not acquired in time.
    Busy,
    /// An internal error was reported to the user.
    Failed,
}

#[derive(Debug, Error)]
enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct Orchestrator<S, F> {
    store: S,
    factory: F,
    gate: GenerationGate,
    settings: OrchestratorSettings,
}

impl<S: ChatStore, F: BackendFactory> Orchestrator<S, F> {
    pub fn new(store: S, factory: F, gate: GenerationGate, settings: OrchestratorSettings) -> Self {
        Self {
            store,
            factory,
            gate,
            settings,
        }
    }

    /// Process one inbound message to its terminal state.
    pub async fn handle_message<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
    ) -> TurnOutcome {
        if msg.text.trim().is_empty() {
            info!(chat_id = msg.chat.id, "received message with empty text");
            return TurnOutcome::Suppressed;
        }

        info!(
            chat_id = msg.chat.id,
            chat_type = %msg.chat.kind,
            sender_id = msg.sender.id,
            username = msg.sender.username.as_deref().unwrap_or_default(),
            text = %msg.text,
            "received message"
        );

        if let Some(command) = Command::parse(&msg.text) {
            return self.handle_command(transport, msg, command).await;
        }

        match self.process(transport, msg).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "turn failed");
                self.send_plain(transport, msg, &self.settings.messages.internal_error)
                    .await;
                TurnOutcome::Failed
            }
        }
    }

    async fn process<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
    ) -> Result<TurnOutcome, TurnError> {
        if !self.is_permitted(msg.chat.id).await? {
            warn!(chat_id = msg.chat.id, "untrusted chat");
            if msg.chat.kind == ChatKind::Private {
                self.send_plain(
                    transport,
                    msg,
                    &self.settings.messages.private_chat_disallowed,
                )
                .await;
                return Ok(TurnOutcome::Denied);
            }
            return Ok(TurnOutcome::Suppressed);
        }

        let history = self
            .store
            .recent_messages(msg.chat.id, self.settings.history_limit)
            .await?;

        // Persisted even for turns that do not warrant a reply, so group
        // context accumulates between addressed messages.
        self.store.append_message(&inbound_record(msg)).await?;

        if !self.should_reply(msg) {
            return Ok(TurnOutcome::Suppressed);
        }

        let chat_override = self.store.get_override(msg.chat.id).await?;
        let effective =
            overlay::resolve_backend(&self.settings.global_backend, &chat_override)?;

        let template = chat_override
            .system_prompt
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(prompt::DEFAULT_SYSTEM_PROMPT);
        let messages = prompt::assemble_turn(
            msg,
            &history,
            template,
            self.settings.bot.id,
            Utc::now(),
        )?;

        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!(chat_id = msg.chat.id, error = %err, "generation slot busy");
                self.send_plain(transport, msg, &self.settings.messages.server_busy)
                    .await;
                return Ok(TurnOutcome::Busy);
            }
        };
        let answer = self.invoke_backend(msg, &effective, &messages).await;
        drop(permit);
        let answer = answer?;

        let answer = strip_reasoning(&answer);
        if answer.is_empty() || answer == SKIP_MARKER {
            info!(chat_id = msg.chat.id, "response suppressed by model");
            return Ok(TurnOutcome::Suppressed);
        }

        if !self.send_rich(transport, msg, answer).await {
            return Ok(TurnOutcome::Failed);
        }

        // The reply has already been delivered at this point, so a failed
        // write costs history, not the turn.
        if let Err(err) = self
            .store
            .append_message(&assistant_record(msg, &self.settings.bot, answer))
            .await
        {
            error!(chat_id = msg.chat.id, error = %err, "failed to store assistant reply");
        }

        Ok(TurnOutcome::Replied)
    }

    async fn invoke_backend(
        &self,
        msg: &IncomingMessage,
        effective: &BackendSettings,
        messages: &[PromptMessage],
    ) -> Result<String, TurnError> {
        let backend = self.factory.build(effective)?;

        let completion = match self.settings.mode {
            BackendMode::Chat => {
                let payload = serde_json::to_string(messages)
                    .unwrap_or_else(|_| "[]".to_string());
                self.audit(msg, effective, &payload).await;
                backend.chat(messages).await?
            }
            BackendMode::Completion => {
                let template = self
                    .settings
                    .completion_template
                    .as_deref()
                    .ok_or_else(|| {
                        RenderError("completion mode requires a transcript template".to_string())
                    })?;
                let rendered = prompt::render_transcript(template, messages)?;
                self.audit(msg, effective, &rendered).await;
                backend.complete(&rendered).await?
            }
        };

        info!(
            chat_id = msg.chat.id,
            duration_ms = completion.stats.total_duration.as_millis() as u64,
            prompt_tokens = completion.stats.prompt_tokens,
            completion_tokens = completion.stats.completion_tokens,
            "backend response"
        );
        Ok(completion.text)
    }

    /// Best-effort audit write; never fails the turn.
    async fn audit(&self, msg: &IncomingMessage, effective: &BackendSettings, payload: &str) {
        let record = GenerationRecord {
            chat_id: msg.chat.id,
            chat_title: prompt::conversation_title(msg),
            sender_id: msg.sender.id,
            username: msg.sender.username.clone(),
            model: effective.model().to_string(),
            options: effective.options_json(),
            prompt: payload.to_string(),
            base_url: effective.base_url().to_string(),
        };
        if let Err(err) = self.store.record_generation(&record).await {
            warn!(chat_id = msg.chat.id, error = %err, "failed to record generation request");
        }
    }

    async fn handle_command<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
        command: Command,
    ) -> TurnOutcome {
        let trusted = match self.store.is_trusted(msg.chat.id).await {
            Ok(trusted) => trusted,
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to check chat trust");
                self.send_plain(transport, msg, &self.settings.messages.internal_error)
                    .await;
                return TurnOutcome::Failed;
            }
        };

        // History clearing stays available to untrusted chats when untrusted
        // chats may talk to the bot at all.
        let permitted = match command {
            Command::Amnesia => trusted || self.settings.allow_untrusted_chats,
            _ => trusted,
        };
        if !permitted {
            self.send_plain(
                transport,
                msg,
                "You do not have permission to use this command.",
            )
            .await;
            return TurnOutcome::Denied;
        }

        match command {
            Command::GetSystemPrompt => self.get_system_prompt(transport, msg).await,
            Command::SetSystemPrompt(prompt) => {
                self.set_system_prompt(transport, msg, &prompt).await
            }
            Command::DeleteSystemPrompt => self.delete_system_prompt(transport, msg).await,
            Command::GetConfig => self.get_config(transport, msg).await,
            Command::Amnesia => self.amnesia(transport, msg).await,
        }
    }

    async fn get_system_prompt<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
    ) -> TurnOutcome {
        let chat_override = match self.store.get_override(msg.chat.id).await {
            Ok(chat_override) => chat_override,
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to get system prompt");
                self.send_plain(
                    transport,
                    msg,
                    "Failed to get prompt. Please check logs for details.",
                )
                .await;
                return TurnOutcome::Failed;
            }
        };

        match chat_override.system_prompt.filter(|p| !p.is_empty()) {
            Some(prompt) => {
                self.send_plain(transport, msg, &prompt).await;
            }
            None => {
                self.send_plain(transport, msg, "No custom system prompt set for this chat.")
                    .await;
            }
        }
        TurnOutcome::Replied
    }

    async fn set_system_prompt<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
        prompt: &str,
    ) -> TurnOutcome {
        if prompt.is_empty() {
            self.send_plain(transport, msg, "Please provide a prompt to set.")
                .await;
            return TurnOutcome::Replied;
        }
        if prompt.len() > SYSTEM_PROMPT_MAX_BYTES {
            self.send_plain(transport, msg, "The provided prompt is too long.")
                .await;
            return TurnOutcome::Replied;
        }

        let patch = OverridePatch {
            chat_title: msg.chat.title.clone(),
            system_prompt: Some(prompt.to_string()),
            ..OverridePatch::default()
        };
        if let Err(err) = self.store.set_override(Some(msg.chat.id), &patch).await {
            error!(chat_id = msg.chat.id, error = %err, "failed to set system prompt");
            self.send_plain(
                transport,
                msg,
                "Failed to set prompt. Please check logs for details.",
            )
            .await;
            return TurnOutcome::Failed;
        }

        info!(
            chat_id = msg.chat.id,
            sender_id = msg.sender.id,
            "system prompt set"
        );
        self.send_plain(transport, msg, "Prompt set successfully.").await;
        TurnOutcome::Replied
    }

    async fn delete_system_prompt<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
    ) -> TurnOutcome {
        if let Err(err) = self.store.delete_override(msg.chat.id).await {
            error!(chat_id = msg.chat.id, error = %err, "failed to delete system prompt");
            self.send_plain(
                transport,
                msg,
                "Failed to delete prompt. Please check logs for details.",
            )
            .await;
            return TurnOutcome::Failed;
        }

        info!(
            chat_id = msg.chat.id,
            sender_id = msg.sender.id,
            "system prompt deleted"
        );
        self.send_plain(transport, msg, "Prompt deleted successfully.")
            .await;
        TurnOutcome::Replied
    }

    async fn get_config<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
    ) -> TurnOutcome {
        let effective = match self.store.get_override(msg.chat.id).await {
            Ok(chat_override) => {
                overlay::resolve_backend(&self.settings.global_backend, &chat_override)
            }
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to get configuration");
                self.send_plain(
                    transport,
                    msg,
                    "Failed to get configuration. Please check logs for details.",
                )
                .await;
                return TurnOutcome::Failed;
            }
        };
        let effective = match effective {
            Ok(effective) => effective,
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to resolve configuration");
                self.send_plain(
                    transport,
                    msg,
                    "Failed to get configuration. Please check logs for details.",
                )
                .await;
                return TurnOutcome::Failed;
            }
        };

        // Base URL and credential are deliberately left out of the reply.
        let options: Value =
            serde_json::from_str(&effective.options_json()).unwrap_or(Value::Null);
        let config = serde_json::json!({
            "model": effective.model(),
            "options": options,
            "history_limit": self.settings.history_limit,
        });
        let pretty = match serde_json::to_string_pretty(&config) {
            Ok(pretty) => pretty,
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to serialize configuration");
                self.send_plain(
                    transport,
                    msg,
                    "Failed to get configuration. Please check logs for details.",
                )
                .await;
                return TurnOutcome::Failed;
            }
        };

        let reply = format!("Current configuration:\n\n```json\n{pretty}\n```");
        self.send_rich(transport, msg, &reply).await;
        TurnOutcome::Replied
    }

    async fn amnesia<T: Transport>(&self, transport: &T, msg: &IncomingMessage) -> TurnOutcome {
        match self.store.clear_messages(msg.chat.id).await {
            Ok(deleted) => {
                info!(
                    chat_id = msg.chat.id,
                    sender_id = msg.sender.id,
                    deleted,
                    "messages cleared"
                );
                self.send_plain(transport, msg, "All messages forgotten.").await;
                TurnOutcome::Replied
            }
            Err(err) => {
                error!(chat_id = msg.chat.id, error = %err, "failed to clear messages");
                self.send_plain(
                    transport,
                    msg,
                    "Failed to clear messages. Please check logs for details.",
                )
                .await;
                TurnOutcome::Failed
            }
        }
    }

    async fn is_permitted(&self, chat_id: i64) -> Result<bool, StoreError> {
        if self.settings.allow_untrusted_chats {
            return Ok(true);
        }
        self.store.is_trusted(chat_id).await
    }

    /// Group chats only reply when addressed; private chats always reply.
    fn should_reply(&self, msg: &IncomingMessage) -> bool {
        if msg.chat.kind == ChatKind::Private {
            return true;
        }
        if msg.is_reply_to(self.settings.bot.id) {
            return true;
        }
        let mention = format!("@{}", self.settings.bot.username.to_lowercase());
        msg.text.to_lowercase().starts_with(&mention)
    }

    /// Formatted delivery with one plain retry. Returns whether any attempt
    /// succeeded.
    async fn send_rich<T: Transport>(
        &self,
        transport: &T,
        msg: &IncomingMessage,
        text: &str,
    ) -> bool {
        if let Err(err) = transport.reply(msg, text, true).await {
            warn!(chat_id = msg.chat.id, error = %err, "formatted delivery failed, retrying plain");
            if let Err(err) = transport.reply(msg, text, false).await {
                error!(chat_id = msg.chat.id, error = %err, "delivery failed");
                return false;
            }
        }
        true
    }

    async fn send_plain<T: Transport>(&self, transport: &T, msg: &IncomingMessage, text: &str) {
        if let Err(err) = transport.reply(msg, text, false).await {
            error!(chat_id = msg.chat.id, error = %err, "delivery failed");
        }
    }
}

fn inbound_record(msg: &IncomingMessage) -> NewMessage {
    NewMessage {
        chat_id: msg.chat.id,
        chat_title: msg.chat.title.clone().unwrap_or_default(),
        role: MessageRole::User,
        sender_id: msg.sender.id,
        username: msg.sender.username.clone(),
        first_name: msg.sender.first_name.clone(),
        last_name: msg.sender.last_name.clone(),
        content: msg.text.clone(),
    }
}

fn assistant_record(msg: &IncomingMessage, bot: &BotIdentity, content: &str) -> NewMessage {
    NewMessage {
        chat_id: msg.chat.id,
        chat_title: msg.chat.title.clone().unwrap_or_default(),
        role: MessageRole::Assistant,
        sender_id: bot.id,
        username: Some(bot.username.clone()),
        first_name: bot.first_name.clone(),
        last_name: bot.last_name.clone(),
        content: content.to_string(),
    }
}

/// Trim and drop everything up to and including the reasoning end marker.
fn strip_reasoning(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find(REASONING_END_MARKER) {
        Some(idx) => trimmed[idx + REASONING_END_MARKER.len()..].trim(),
        None => trimmed,
    }
}
