//! Interactive console chat session.
//!
//! Drives the conversation pipeline from stdin: each line becomes an
//! incoming private-chat message and the reply is printed to stdout. Slash
//! commands (`/getsysprompt`, `/setsysprompt`, `/amnesia`, ...) work the
//! same as they would over a messaging transport.

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_core::orchestrator::TurnOutcome;
use parley_core::transport::{Transport, TransportError};
use parley_types::chat::{ChatInfo, ChatKind, IncomingMessage, Sender};

use crate::state::AppState;

/// Prints replies to stdout. Rich text is rendered dim-prefixed as-is; the
/// fallback plain rendition never fails.
pub struct ConsoleTransport {
    bot_name: String,
}

impl ConsoleTransport {
    pub fn new(bot_name: String) -> Self {
        Self { bot_name }
    }
}

impl Transport for ConsoleTransport {
    async fn reply(
        &self,
        _to: &IncomingMessage,
        text: &str,
        _rich: bool,
    ) -> Result<(), TransportError> {
        println!();
        println!("  {} {text}", style(format!("{} ›", self.bot_name)).cyan().bold());
        println!();
        Ok(())
    }
}

/// Run the interactive chat loop until EOF or `/quit`.
pub async fn run_chat_loop(state: &AppState, chat_id: i64, name: &str) -> Result<()> {
    let orchestrator = state.orchestrator()?;
    let transport = ConsoleTransport::new(state.config.bot.first_name.clone());

    println!();
    println!(
        "  {} Chatting as chat {} with {} ({})",
        style("⚡").bold(),
        style(chat_id).cyan(),
        style(&state.config.bot.first_name).cyan(),
        state
            .config
            .backend_settings()
            .map(|s| s.model().to_string())
            .unwrap_or_default()
    );
    println!(
        "  {}",
        style("Type /quit or press Ctrl+D to exit").dim()
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        use std::io::Write;
        print!("  {} ", style(format!("{name} ›")).green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" || text == "/exit" {
            break;
        }

        let msg = IncomingMessage {
            chat: ChatInfo {
                id: chat_id,
                kind: ChatKind::Private,
                title: None,
            },
            sender: Sender {
                id: chat_id,
                username: None,
                first_name: name.to_string(),
                last_name: None,
            },
            text: text.to_string(),
            reply_to: None,
        };

        let outcome = orchestrator.handle_message(&transport, &msg).await;
        if outcome == TurnOutcome::Denied {
            println!(
                "  {} This chat is not trusted. Trust it with: {}",
                style("i").blue().bold(),
                style(format!("parley trust {chat_id}")).yellow()
            );
            println!();
        }
    }

    println!("\n  Goodbye.");
    Ok(())
}
