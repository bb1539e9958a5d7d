//! Shared domain types for Parley.
//!
//! This crate has no business logic and no infrastructure dependencies.
//! It defines the data shapes passed between the core orchestration
//! pipeline, the SQLite store, and the backend clients.

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod message;
