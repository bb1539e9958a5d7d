//! Generative backend trait definitions.
//!
//! A backend is built per turn from the effective (overlay-resolved)
//! settings, since overrides can change the base URL, model, or credential
//! mid-conversation. Providers expose two capabilities; which one is used
//! depends on the configured processing mode.

use parley_types::backend::{BackendError, BackendMode, Completion, PromptMessage};
use parley_types::config::BackendSettings;

/// One generative-text provider, constructed for a single turn.
///
/// Each capability has a default body that fails with
/// [`BackendError::UnsupportedOperation`]; a provider overrides the modes it
/// actually implements.
pub trait GenerativeBackend: Send + Sync {
    /// Provider label used in error reporting.
    fn provider(&self) -> &'static str;

    /// Send the ordered message list (chat mode).
    fn chat(
        &self,
        _messages: &[PromptMessage],
    ) -> impl std::future::Future<Output = Result<Completion, BackendError>> + Send {
        async move {
            Err(BackendError::UnsupportedOperation {
                provider: self.provider().to_string(),
                mode: BackendMode::Chat,
            })
        }
    }

    /// Send a single rendered transcript string (completion mode).
    fn complete(
        &self,
        _prompt: &str,
    ) -> impl std::future::Future<Output = Result<Completion, BackendError>> + Send {
        async move {
            Err(BackendError::UnsupportedOperation {
                provider: self.provider().to_string(),
                mode: BackendMode::Completion,
            })
        }
    }
}

/// Builds a provider from effective settings.
pub trait BackendFactory: Send + Sync {
    type Backend: GenerativeBackend;

    fn build(&self, settings: &BackendSettings) -> Result<Self::Backend, BackendError>;
}
