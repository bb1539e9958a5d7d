//! Config overlay resolution.
//!
//! Produces the backend settings actually used for one turn by layering a
//! chat's override record over the globally configured settings. Each field
//! set in the override replaces the global value; absent fields keep it. An
//! options blob replaces the global options wholesale, it is never
//! deep-merged.

use parley_types::config::{BackendSettings, ChatOverride, OpenAiOptions};
use parley_types::error::OverlayError;
use serde_json::{Map, Value};

/// Resolve the effective backend settings for a turn.
///
/// The override's `options` blob must decode to the shape expected by the
/// configured provider; a mismatch fails the turn rather than silently
/// dropping the options.
pub fn resolve_backend(
    global: &BackendSettings,
    overlay: &ChatOverride,
) -> Result<BackendSettings, OverlayError> {
    match global {
        BackendSettings::Ollama(settings) => {
            let mut effective = settings.clone();
            if let Some(base_url) = &overlay.base_url {
                effective.base_url = base_url.clone();
            }
            if let Some(model) = &overlay.model {
                effective.model = model.clone();
            }
            if let Some(blob) = &overlay.options {
                effective.options = decode_options::<Map<String, Value>>("ollama", blob)?;
            }
            Ok(BackendSettings::Ollama(effective))
        }
        BackendSettings::OpenAi(settings) => {
            let mut effective = settings.clone();
            if let Some(base_url) = &overlay.base_url {
                effective.base_url = base_url.clone();
            }
            if let Some(api_key) = &overlay.api_key {
                effective.api_key = api_key.clone();
            }
            if let Some(model) = &overlay.model {
                effective.model = model.clone();
            }
            if let Some(blob) = &overlay.options {
                effective.options = decode_options::<OpenAiOptions>("openai", blob)?;
            }
            Ok(BackendSettings::OpenAi(effective))
        }
    }
}

fn decode_options<T: serde::de::DeserializeOwned>(
    provider: &str,
    blob: &str,
) -> Result<T, OverlayError> {
    serde_json::from_str(blob).map_err(|err| OverlayError::TypeMismatch {
        provider: provider.to_string(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::config::{OllamaSettings, OpenAiSettings};

    fn global_ollama() -> BackendSettings {
        let mut options = Map::new();
        options.insert("temperature".to_string(), Value::from(0.6));
        options.insert("num_ctx".to_string(), Value::from(8192));
        BackendSettings::Ollama(OllamaSettings {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.3:70b".to_string(),
            options,
        })
    }

    fn global_openai() -> BackendSettings {
        BackendSettings::OpenAi(OpenAiSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "sk-global".to_string(),
            model: "gpt-4o".to_string(),
            options: OpenAiOptions::default(),
        })
    }

    #[test]
    fn test_override_fields_replace_globals() {
        let overlay = ChatOverride {
            base_url: Some("http://gpu-box:11434".to_string()),
            model: Some("qwen3:32b".to_string()),
            ..ChatOverride::default()
        };
        let effective = resolve_backend(&global_ollama(), &overlay).unwrap();
        assert_eq!(effective.base_url(), "http://gpu-box:11434");
        assert_eq!(effective.model(), "qwen3:32b");
    }

    #[test]
    fn test_absent_fields_keep_globals() {
        let effective = resolve_backend(&global_ollama(), &ChatOverride::default()).unwrap();
        assert_eq!(effective.base_url(), "http://localhost:11434");
        assert_eq!(effective.model(), "llama3.3:70b");
    }

    #[test]
    fn test_options_blob_replaces_not_merges() {
        let overlay = ChatOverride {
            options: Some(r#"{"temperature": 1.0}"#.to_string()),
            ..ChatOverride::default()
        };
        let effective = resolve_backend(&global_ollama(), &overlay).unwrap();
        let BackendSettings::Ollama(settings) = effective else {
            panic!("provider changed during overlay");
        };
        assert_eq!(settings.options.get("temperature"), Some(&Value::from(1.0)));
        assert!(settings.options.get("num_ctx").is_none());
    }

    #[test]
    fn test_openai_credential_override() {
        let overlay = ChatOverride {
            api_key: Some("sk-chat".to_string()),
            ..ChatOverride::default()
        };
        let effective = resolve_backend(&global_openai(), &overlay).unwrap();
        let BackendSettings::OpenAi(settings) = effective else {
            panic!("provider changed during overlay");
        };
        assert_eq!(settings.api_key, "sk-chat");
    }

    #[test]
    fn test_foreign_options_blob_is_type_mismatch() {
        let overlay = ChatOverride {
            options: Some(r#"{"num_ctx": 8192}"#.to_string()),
            ..ChatOverride::default()
        };
        let err = resolve_backend(&global_openai(), &overlay).unwrap_err();
        let OverlayError::TypeMismatch { provider, .. } = err;
        assert_eq!(provider, "openai");
    }

    #[test]
    fn test_malformed_options_blob_is_type_mismatch() {
        let overlay = ChatOverride {
            options: Some("not json".to_string()),
            ..ChatOverride::default()
        };
        assert!(resolve_backend(&global_ollama(), &overlay).is_err());
    }
}
