//! Backend settings and per-chat override types.
//!
//! `BackendSettings` is a tagged union with one variant per provider, so
//! provider-specific fields are only reachable after matching on the
//! discriminant. `ChatOverride` carries the per-chat deltas layered over the
//! global settings; every field is independently optional and an absent
//! field never clears the global value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings for an Ollama backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    /// Passed through verbatim as the Ollama `options` object.
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Sampling options for an OpenAI-compatible backend.
///
/// This is the shape an override `options` blob must decode to when the
/// configured provider is OpenAI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiOptions {
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default)]
    pub presence_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
}

/// Settings for an OpenAI-compatible backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub options: OpenAiOptions,
}

/// Effective backend configuration, tagged by provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum BackendSettings {
    Ollama(OllamaSettings),
    OpenAi(OpenAiSettings),
}

impl BackendSettings {
    /// Provider name for logs and error messages.
    pub fn provider_name(&self) -> &'static str {
        match self {
            BackendSettings::Ollama(_) => "ollama",
            BackendSettings::OpenAi(_) => "openai",
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            BackendSettings::Ollama(s) => &s.base_url,
            BackendSettings::OpenAi(s) => &s.base_url,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            BackendSettings::Ollama(s) => &s.model,
            BackendSettings::OpenAi(s) => &s.model,
        }
    }

    /// Resolved options serialized as JSON, for the audit trail.
    pub fn options_json(&self) -> String {
        let value = match self {
            BackendSettings::Ollama(s) => serde_json::to_value(&s.options),
            BackendSettings::OpenAi(s) => serde_json::to_value(&s.options),
        };
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "{}".to_string())
    }
}

/// Per-chat configuration deltas, as read from the store.
///
/// `get_override` returns the global row overlaid field-wise by the
/// chat-specific row; when neither exists every field is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOverride {
    pub chat_title: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Serialized JSON blob; decoded against the provider discriminant
    /// during overlay resolution.
    pub options: Option<String>,
    pub system_prompt: Option<String>,
}

impl ChatOverride {
    pub fn is_empty(&self) -> bool {
        self.chat_title.is_none()
            && self.base_url.is_none()
            && self.api_key.is_none()
            && self.model.is_none()
            && self.options.is_none()
            && self.system_prompt.is_none()
    }

    /// Overlay `self` with `other`, field-wise: any field set in `other`
    /// wins, any field absent in `other` keeps the value from `self`.
    pub fn overlaid_with(&self, other: &ChatOverride) -> ChatOverride {
        ChatOverride {
            chat_title: other.chat_title.clone().or_else(|| self.chat_title.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            model: other.model.clone().or_else(|| self.model.clone()),
            options: other.options.clone().or_else(|| self.options.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
        }
    }
}

/// Field-wise patch for `set_override`: `None` leaves the stored field
/// unchanged, `Some` replaces it.
#[derive(Debug, Clone, Default)]
pub struct OverridePatch {
    pub chat_title: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub options: Option<String>,
    pub system_prompt: Option<String>,
}

impl OverridePatch {
    pub fn system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chat_title.is_none()
            && self.base_url.is_none()
            && self.api_key.is_none()
            && self.model.is_none()
            && self.options.is_none()
            && self.system_prompt.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_specific_fields() {
        let global = ChatOverride {
            model: Some("llama3.3:70b".to_string()),
            base_url: Some("http://global:11434".to_string()),
            system_prompt: Some("global prompt".to_string()),
            ..ChatOverride::default()
        };
        let specific = ChatOverride {
            model: Some("qwen3:32b".to_string()),
            ..ChatOverride::default()
        };

        let merged = global.overlaid_with(&specific);
        assert_eq!(merged.model.as_deref(), Some("qwen3:32b"));
        assert_eq!(merged.base_url.as_deref(), Some("http://global:11434"));
        assert_eq!(merged.system_prompt.as_deref(), Some("global prompt"));
    }

    #[test]
    fn test_overlay_absent_field_does_not_blank_global() {
        let global = ChatOverride {
            api_key: Some("sk-global".to_string()),
            ..ChatOverride::default()
        };
        let merged = global.overlaid_with(&ChatOverride::default());
        assert_eq!(merged.api_key.as_deref(), Some("sk-global"));
    }

    #[test]
    fn test_settings_tagged_serde() {
        let settings = BackendSettings::Ollama(OllamaSettings {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.3:70b".to_string(),
            options: Map::new(),
        });
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["provider"], "ollama");
    }

    #[test]
    fn test_openai_options_rejects_foreign_shape() {
        // An Ollama-style options object must not decode as OpenAI options.
        let blob = r#"{"num_ctx": 8192, "mirostat": 1}"#;
        assert!(serde_json::from_str::<OpenAiOptions>(blob).is_err());
    }

    #[test]
    fn test_options_json_never_fails() {
        let settings = BackendSettings::OpenAi(OpenAiSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            options: OpenAiOptions::default(),
        });
        let json = settings.options_json();
        assert!(json.contains("frequency_penalty"));
    }
}
