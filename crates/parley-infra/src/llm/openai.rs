//! OpenAI-compatible backend client.
//!
//! Chat mode posts to `/chat/completions`; completion mode posts to the
//! legacy `/completions` endpoint. Authentication is a bearer token. The
//! server does not report request durations, so stats are measured
//! client-side.

use std::time::{Duration, Instant};

use parley_types::backend::{BackendError, Completion, GenerationStats, PromptMessage};
use parley_types::config::{OpenAiOptions, OpenAiSettings};
use serde::{Deserialize, Serialize};

// No Debug derive: the client holds the API key.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    options: OpenAiOptions,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    frequency_penalty: f64,
    presence_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a str>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    frequency_penalty: f64,
    presence_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a str>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Usage,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings, timeout: Duration) -> Result<Self, BackendError> {
        if settings.base_url.is_empty() {
            return Err(BackendError::InvalidConfig(
                "openai base URL cannot be empty".to_string(),
            ));
        }
        if settings.api_key.is_empty() {
            return Err(BackendError::InvalidConfig(
                "openai API key cannot be empty".to_string(),
            ));
        }
        if settings.model.is_empty() {
            return Err(BackendError::InvalidConfig(
                "openai model cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            options: settings.options.clone(),
        })
    }

    pub async fn chat(&self, messages: &[PromptMessage]) -> Result<Completion, BackendError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
            frequency_penalty: self.options.frequency_penalty,
            presence_penalty: self.options.presence_penalty,
            reasoning_effort: self.options.reasoning_effort.as_deref(),
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            max_completion_tokens: self.options.max_tokens,
            stop: self.options.stop.as_deref(),
        };

        let started = Instant::now();
        let response: ChatCompletionResponse = self.post("/chat/completions", &body).await?;
        let elapsed = started.elapsed();

        let choice = response.choices.into_iter().next().ok_or(BackendError::EmptyChoices)?;
        Ok(Completion {
            text: choice.message.content,
            stats: stats(choice.finish_reason, elapsed, response.usage),
        })
    }

    pub async fn complete(&self, prompt: &str) -> Result<Completion, BackendError> {
        let body = CompletionRequest {
            model: &self.model,
            prompt,
            frequency_penalty: self.options.frequency_penalty,
            presence_penalty: self.options.presence_penalty,
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            max_tokens: self.options.max_tokens,
            stop: self.options.stop.as_deref(),
        };

        let started = Instant::now();
        let response: CompletionResponse = self.post("/completions", &body).await?;
        let elapsed = started.elapsed();

        let choice = response.choices.into_iter().next().ok_or(BackendError::EmptyChoices)?;
        Ok(Completion {
            text: choice.text,
            stats: stats(choice.finish_reason, elapsed, response.usage),
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
            .bearer_auth(&self.api_key)
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

fn stats(finish_reason: Option<String>, elapsed: Duration, usage: Usage) -> GenerationStats {
    GenerationStats {
        done_reason: finish_reason,
        total_duration: elapsed,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::message::MessageRole;

    fn settings() -> OpenAiSettings {
        OpenAiSettings {
            base_url: "https://api.openai.com/v1/".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            options: OpenAiOptions {
                reasoning_effort: Some("medium".to_string()),
                temperature: Some(1.0),
                top_p: Some(1.0),
                ..OpenAiOptions::default()
            },
        }
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new(&settings(), Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let mut cfg = settings();
        cfg.api_key = String::new();
        let err = OpenAiClient::new(&cfg, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, BackendError::InvalidConfig(_)));
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let messages = vec![PromptMessage::new(MessageRole::System, "be brief")];
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            reasoning_effort: Some("medium"),
            temperature: Some(1.0),
            top_p: None,
            max_completion_tokens: None,
            stop: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["reasoning_effort"], "medium");
        assert!(json.get("top_p").is_none());
        assert!(json.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_empty_choices_maps_to_error() {
        let json = r#"{"choices": [], "usage": {"prompt_tokens": 1, "completion_tokens": 0}}"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert!(response.choices.is_empty());
    }

    #[test]
    fn test_completion_response_parsing() {
        let json = r#"{
            "choices": [{"text": "hello", "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        }"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].text, "hello");
        assert_eq!(response.usage.completion_tokens, 2);
    }
}
