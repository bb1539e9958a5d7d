//! Prompt assembly.
//!
//! Renders the system-directive template with per-turn context and builds
//! the ordered message list sent to the backend: fetched history
//! (oldest-first), one synthetic system message, then the inbound user
//! message. The synthetic system message is never persisted.
//!
//! Templates come from chat overrides and are user-supplied, so every
//! render failure is recoverable for that turn only.

use chrono::{DateTime, SecondsFormat, Utc};
use minijinja::{Environment, context};
use parley_types::backend::PromptMessage;
use parley_types::chat::{ChatKind, IncomingMessage};
use parley_types::message::{MessageRole, StoredMessage};
use thiserror::Error;

/// Character budget for the replied-to excerpt injected into the template
/// context, ellipsis included.
pub const REPLY_EXCERPT_MAX_CHARS: usize = 256;

/// Built-in system-directive template, used when a chat has no override.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"current_time="{{ current_time }}"
chat_title="{{ chat_title }}"
chat_type="{{ chat_type }}"
{% if reply_excerpt %}reply_excerpt="{{ reply_excerpt }}"
{% endif %}
# Begin System Directives

Your name is Parley.
You are an AI assistant for group and private conversations.
Your task is to help users by providing information and answering questions.
You must not engage in any harmful, illegal, or unethical conversations.
You must be polite, respectful, and helpful to all users.
You must obey laws, morals, and ethics.
You should respond in plain text.

# End System Directives"#;

#[derive(Debug, Error)]
#[error("template render error: {0}")]
pub struct RenderError(pub String);

/// Truncate to at most `max` characters, ellipsis included. Operates on
/// char boundaries so multi-byte characters are never split.
pub fn truncate_chars(input: &str, max: usize) -> String {
    let count = input.chars().count();
    if count <= max {
        return input.to_string();
    }
    if max < 1 {
        return String::new();
    }
    let mut out: String = input.chars().take(max - 1).collect();
    out.push('…');
    out
}

/// Display title for a conversation: the sender's name in private chats,
/// the configured title in groups.
pub fn conversation_title(msg: &IncomingMessage) -> String {
    match msg.chat.kind {
        ChatKind::Private => msg.sender.display_name(),
        ChatKind::Group => msg.chat.title.clone().unwrap_or_default(),
    }
}

/// Render the system-directive template with this turn's context.
///
/// `reply_excerpt` is exposed only when the inbound message replies to one
/// of the bot's own messages.
pub fn render_system_prompt(
    template: &str,
    msg: &IncomingMessage,
    bot_id: i64,
    now: DateTime<Utc>,
) -> Result<String, RenderError> {
    let reply_excerpt = msg
        .reply_to
        .as_ref()
        .filter(|_| msg.is_reply_to(bot_id))
        .map(|r| truncate_chars(&r.text, REPLY_EXCERPT_MAX_CHARS));

    let ctx = context! {
        current_time => now.to_rfc3339_opts(SecondsFormat::Secs, true),
        chat_title => conversation_title(msg),
        chat_type => msg.chat.kind.to_string(),
        reply_excerpt => reply_excerpt,
    };

    render("system_prompt", template, ctx)
}

/// Build the ordered message list for one turn.
pub fn assemble_turn(
    msg: &IncomingMessage,
    history: &[StoredMessage],
    system_template: &str,
    bot_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<PromptMessage>, RenderError> {
    let system_prompt = render_system_prompt(system_template, msg, bot_id, now)?;

    let mut messages: Vec<PromptMessage> = history
        .iter()
        .map(|m| PromptMessage::new(m.role, m.content.clone()))
        .collect();
    messages.push(PromptMessage::new(MessageRole::System, system_prompt));
    messages.push(PromptMessage::new(MessageRole::User, msg.text.clone()));
    Ok(messages)
}

/// Render the completion-mode transcript template over the full message
/// list. The template sees a `messages` list of `{role, content}` objects.
pub fn render_transcript(
    template: &str,
    messages: &[PromptMessage],
) -> Result<String, RenderError> {
    render("transcript", template, context! { messages => messages })
}

fn render(
    name: &str,
    source: &str,
    ctx: minijinja::value::Value,
) -> Result<String, RenderError> {
    let mut env = Environment::new();
    env.add_template(name, source)
        .map_err(|err| RenderError(err.to_string()))?;
    let template = env
        .get_template(name)
        .map_err(|err| RenderError(err.to_string()))?;
    template.render(ctx).map_err(|err| RenderError(err.to_string()))
}
