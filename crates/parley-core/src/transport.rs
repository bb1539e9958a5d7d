//! Transport trait definition.
//!
//! The messaging front-end proper is out of scope; the pipeline only needs
//! a way to send a reply addressed to the triggering message. `rich` asks
//! for formatted delivery (e.g. Markdown); callers retry with `rich = false`
//! when formatted delivery fails.

use parley_types::chat::IncomingMessage;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct TransportError(pub String);

pub trait Transport: Send + Sync {
    fn reply(
        &self,
        to: &IncomingMessage,
        text: &str,
        rich: bool,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
