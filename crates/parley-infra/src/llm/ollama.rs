//! Ollama backend client.
//!
//! Chat mode posts the message list to `/api/chat`; completion mode posts
//! the rendered transcript to `/api/generate` in raw mode (no server-side
//! prompt templating). Both disable streaming and pass the options map
//! through verbatim.

use std::time::Duration;

use parley_types::backend::{BackendError, Completion, GenerationStats, PromptMessage};
use parley_types::config::OllamaSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: Map<String, Value>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    options: &'a Map<String, Value>,
    stream: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    options: &'a Map<String, Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(flatten)]
    metrics: Metrics,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(flatten)]
    metrics: Metrics,
}

/// Generation metrics shared by both endpoints. Durations are nanoseconds.
#[derive(Deserialize, Default)]
struct Metrics {
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    total_duration: u64,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl Metrics {
    fn into_stats(self) -> GenerationStats {
        GenerationStats {
            done_reason: self.done_reason,
            total_duration: Duration::from_nanos(self.total_duration),
            prompt_tokens: self.prompt_eval_count,
            completion_tokens: self.eval_count,
        }
    }
}

impl OllamaClient {
    pub fn new(settings: &OllamaSettings, timeout: Duration) -> Result<Self, BackendError> {
        if settings.base_url.is_empty() {
            return Err(BackendError::InvalidConfig(
                "ollama base URL cannot be empty".to_string(),
            ));
        }
        if settings.model.is_empty() {
            return Err(BackendError::InvalidConfig(
                "ollama model cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            options: settings.options.clone(),
        })
    }

    pub async fn chat(&self, messages: &[PromptMessage]) -> Result<Completion, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
            options: &self.options,
            stream: false,
        };

        let response: ChatResponse = self.post("/api/chat", &body).await?;
        Ok(Completion {
            text: response.message.content,
            stats: response.metrics.into_stats(),
        })
    }

    pub async fn complete(&self, prompt: &str) -> Result<Completion, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            raw: true,
            options: &self.options,
            stream: false,
        };

        let response: GenerateResponse = self.post("/api/generate", &body).await?;
        Ok(Completion {
            text: response.response,
            stats: response.metrics.into_stats(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::message::MessageRole;

    fn client() -> OllamaClient {
        OllamaClient::new(
            &OllamaSettings {
                base_url: "http://localhost:11434/".to_string(),
                model: "llama3.3:70b".to_string(),
                options: serde_json::Map::new(),
            },
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(client().base_url, "http://localhost:11434");
    }

    #[test]
    fn test_empty_model_is_rejected() {
        let err = OllamaClient::new(
            &OllamaSettings {
                base_url: "http://localhost:11434".to_string(),
                model: String::new(),
                options: serde_json::Map::new(),
            },
            Duration::from_secs(10),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::InvalidConfig(_)));
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let mut options = serde_json::Map::new();
        options.insert("temperature".to_string(), Value::from(0.6));
        let messages = vec![PromptMessage::new(MessageRole::User, "hi")];

        let body = ChatRequest {
            model: "llama3.3:70b",
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
            options: &options,
            stream: false,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.3:70b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["options"]["temperature"], 0.6);
    }

    #[test]
    fn test_generate_request_is_raw() {
        let options = serde_json::Map::new();
        let body = GenerateRequest {
            model: "llama3.3:70b",
            prompt: "user: hi\n",
            raw: true,
            options: &options,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["raw"], true);
        assert_eq!(json["prompt"], "user: hi\n");
    }

    #[test]
    fn test_metrics_mapping() {
        let json = r#"{
            "message": {"role": "assistant", "content": "hello"},
            "done_reason": "stop",
            "total_duration": 2000000000,
            "prompt_eval_count": 12,
            "eval_count": 34
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let stats = response.metrics.into_stats();
        assert_eq!(stats.done_reason.as_deref(), Some("stop"));
        assert_eq!(stats.total_duration, Duration::from_secs(2));
        assert_eq!(stats.prompt_tokens, 12);
        assert_eq!(stats.completion_tokens, 34);
    }

    #[test]
    fn test_missing_metrics_default_to_zero() {
        let json = r#"{"message": {"role": "assistant", "content": "hello"}}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let stats = response.metrics.into_stats();
        assert!(stats.done_reason.is_none());
        assert_eq!(stats.completion_tokens, 0);
    }
}
