//! Generative backend clients.
//!
//! One client per provider, both speaking plain HTTP through reqwest. A
//! backend is constructed per turn from the effective settings, so override
//! changes to base URL, model, or credential take effect immediately.

pub mod ollama;
pub mod openai;

use std::time::Duration;

use parley_core::backend::{BackendFactory, GenerativeBackend};
use parley_types::backend::{BackendError, Completion, PromptMessage};
use parley_types::config::BackendSettings;

use ollama::OllamaClient;
use openai::OpenAiClient;

/// Provider dispatch over the concrete clients.
#[derive(Debug)]
pub enum Backend {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl GenerativeBackend for Backend {
    fn provider(&self) -> &'static str {
        match self {
            Backend::Ollama(_) => "ollama",
            Backend::OpenAi(_) => "openai",
        }
    }

    async fn chat(&self, messages: &[PromptMessage]) -> Result<Completion, BackendError> {
        match self {
            Backend::Ollama(client) => client.chat(messages).await,
            Backend::OpenAi(client) => client.chat(messages).await,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, BackendError> {
        match self {
            Backend::Ollama(client) => client.complete(prompt).await,
            Backend::OpenAi(client) => client.complete(prompt).await,
        }
    }
}

/// Builds reqwest-backed clients with a shared request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestBackendFactory {
    timeout: Duration,
}

impl ReqwestBackendFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl BackendFactory for ReqwestBackendFactory {
    type Backend = Backend;

    fn build(&self, settings: &BackendSettings) -> Result<Backend, BackendError> {
        match settings {
            BackendSettings::Ollama(settings) => {
                Ok(Backend::Ollama(OllamaClient::new(settings, self.timeout)?))
            }
            BackendSettings::OpenAi(settings) => {
                Ok(Backend::OpenAi(OpenAiClient::new(settings, self.timeout)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::config::{OllamaSettings, OpenAiOptions, OpenAiSettings};

    #[test]
    fn test_factory_dispatches_on_provider() {
        let factory = ReqwestBackendFactory::new(Duration::from_secs(10));

        let backend = factory
            .build(&BackendSettings::Ollama(OllamaSettings {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.3:70b".to_string(),
                options: serde_json::Map::new(),
            }))
            .unwrap();
        assert!(matches!(backend, Backend::Ollama(_)));

        let backend = factory
            .build(&BackendSettings::OpenAi(OpenAiSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: "sk-test".to_string(),
                model: "gpt-4o".to_string(),
                options: OpenAiOptions::default(),
            }))
            .unwrap();
        assert!(matches!(backend, Backend::OpenAi(_)));
    }

    #[test]
    fn test_factory_rejects_invalid_settings() {
        let factory = ReqwestBackendFactory::new(Duration::from_secs(10));
        let err = factory
            .build(&BackendSettings::Ollama(OllamaSettings {
                base_url: String::new(),
                model: "llama3.3:70b".to_string(),
                options: serde_json::Map::new(),
            }))
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidConfig(_)));
    }
}
