//! CLI command definitions and dispatch for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod trust;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Converse with a generative-text backend from your terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (default: parley.toml on the search path).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Chat ID to converse under.
        #[arg(long, default_value = "1")]
        chat_id: i64,

        /// Display name for your side of the conversation.
        #[arg(long, default_value = "You")]
        name: String,
    },

    /// Mark a chat as trusted.
    Trust {
        /// Chat ID to trust.
        chat_id: i64,

        /// Human-readable title for the chat.
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Remove a chat from the trusted set.
    Untrust {
        /// Chat ID to untrust.
        chat_id: i64,
    },

    /// List trusted chats.
    Trusted,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
