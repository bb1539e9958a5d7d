//! Conversation orchestration pipeline for Parley.
//!
//! This crate defines the "ports" (store, backend, and transport traits)
//! that the infrastructure layer implements, plus the pure pipeline pieces:
//! overlay resolution, prompt assembly, the generation gate, the command
//! router, and the per-message orchestrator. It depends only on
//! `parley-types` -- never on `parley-infra` or any database/IO crate.

pub mod backend;
pub mod command;
pub mod gate;
pub mod orchestrator;
pub mod overlay;
pub mod prompt;
pub mod store;
pub mod transport;
