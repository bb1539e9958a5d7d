//! Trust management CLI commands: trust, untrust, list.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use parley_core::store::ChatStore;

use crate::state::AppState;

/// Mark a chat as trusted, updating the title if it is already trusted.
pub async fn trust_chat(state: &AppState, chat_id: i64, title: &str, json: bool) -> Result<()> {
    state.store.trust_chat(chat_id, title).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "chat_id": chat_id,
                "chat_title": title,
                "trusted": true,
            }))?
        );
        return Ok(());
    }

    println!(
        "  {} Chat {} is now trusted.",
        style("✓").green(),
        style(chat_id).cyan()
    );
    Ok(())
}

/// Remove a chat from the trusted set.
pub async fn untrust_chat(state: &AppState, chat_id: i64, json: bool) -> Result<()> {
    let removed = state.store.untrust_chat(chat_id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "chat_id": chat_id,
                "removed": removed,
            }))?
        );
        return Ok(());
    }

    if removed {
        println!(
            "  {} Chat {} is no longer trusted.",
            style("✓").green(),
            style(chat_id).cyan()
        );
    } else {
        println!(
            "  {} Chat {} was not trusted.",
            style("i").blue().bold(),
            style(chat_id).cyan()
        );
    }
    Ok(())
}

/// List trusted chats as a table.
pub async fn list_trusted(state: &AppState, json: bool) -> Result<()> {
    let chats = state.store.trusted_chats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No trusted chats. Trust one with: {}",
            style("i").blue().bold(),
            style("parley trust <chat-id>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Chat ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
    ]);

    for chat in &chats {
        let title = if chat.chat_title.is_empty() {
            Cell::new("(untitled)").fg(Color::DarkGrey)
        } else {
            Cell::new(&chat.chat_title)
        };
        table.add_row(vec![Cell::new(chat.chat_id).fg(Color::Cyan), title]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} trusted chat{}",
        style(chats.len()).bold(),
        if chats.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
