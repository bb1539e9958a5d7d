//! Infrastructure implementations for Parley.
//!
//! Provides the SQLite-backed chat store, the reqwest-based generative
//! backend clients, and the TOML configuration loader.

pub mod config;
pub mod llm;
pub mod sqlite;
