//! Completion client for the hosted chat-completions API.
//!
//! Provides a `CompletionBackend` trait with an OpenAI-compatible
//! implementation. Requests use a fixed model, fixed temperature and seed,
//! no streaming, and a strict JSON-schema `response_format`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::CompletionConfig;
use crate::prompt::PromptMessage;
use crate::reply::response_schema;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ============================================================================
// CompletionBackend trait
// ============================================================================

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send the message sequence and return the assistant message content.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing message content in response")]
    MissingContent,

    #[error("Missing API key (OPENAI_API_KEY is not set)")]
    MissingApiKey,

    #[error("All {attempts} completion attempts failed: {last}")]
    RetryExhausted { attempts: usize, last: Box<CompletionError> },
}

// ============================================================================
// Client settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub seed: i64,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl CompletionSettings {
    /// Build from config; the API key falls back to `OPENAI_API_KEY`.
    pub fn from_config(config: &CompletionConfig, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            seed: config.seed,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    seed: i64,
    stream: bool,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    settings: CompletionSettings,
}

impl OpenAiCompletionClient {
    pub fn new(settings: CompletionSettings) -> Result<Self, CompletionError> {
        if settings.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self { client, settings })
    }

    fn response_format() -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "assistant_reply",
                "strict": true,
                "schema": response_schema(),
            }
        })
    }

    async fn complete_once(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.settings.base_url);

        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            seed: self.settings.seed,
            stream: false,
            response_format: Self::response_format(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");

            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::MissingContent)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        if self.settings.max_retries == 0 {
            return self.complete_once(messages).await;
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.settings.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.settings.max_retries);

        Retry::spawn(retry_strategy, || self.complete_once(messages))
            .await
            .map_err(|e| {
                let attempts = self.settings.max_retries + 1;
                tracing::error!(attempts, error = %e, "All completion attempts failed");
                CompletionError::RetryExhausted {
                    attempts,
                    last: Box::new(e),
                }
            })
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(api_key: &str, base_url: String, max_retries: usize) -> CompletionSettings {
        CompletionSettings {
            api_key: api_key.to_string(),
            base_url,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            seed: 42,
            timeout: Duration::from_secs(5),
            max_retries,
            retry_delay_ms: 10,
        }
    }

    fn messages() -> Vec<PromptMessage> {
        vec![
            PromptMessage::new(Role::System, "system prompt"),
            PromptMessage::new(Role::User, "Do you offer telehealth?"),
        ]
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_complete_sends_fixed_decoding_and_schema() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 0)).unwrap();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "temperature": 0.3,
                "seed": 42,
                "stream": false,
                "messages": [
                    { "role": "system", "content": "system prompt" },
                    { "role": "user", "content": "Do you offer telehealth?" }
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": { "name": "assistant_reply", "strict": true }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"answer":"Yes.","cta":"NONE","sources":[]}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let content = client.complete(&messages()).await.unwrap();
        assert_eq!(content, r#"{"answer":"Yes.","cta":"NONE","sources":[]}"#);
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced_without_retry() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 0)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "The server had an error", "type": "server_error" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.complete(&messages()).await {
            Err(CompletionError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "The server had an error");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body_kept_verbatim() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 0)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        match client.complete(&messages()).await {
            Err(CompletionError::Api { code, message }) => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_configured_retries_recover_from_429() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 2)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .mount(&mock_server)
            .await;

        assert_eq!(client.complete(&messages()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_attempts() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 2)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.complete(&messages()).await {
            Err(CompletionError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_content_is_missing_content() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompletionClient::new(test_settings("test-key", mock_server.uri(), 0)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }]
            })))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.complete(&messages()).await,
            Err(CompletionError::MissingContent)
        ));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = OpenAiCompletionClient::new(test_settings("", "http://localhost".into(), 0));
        assert!(matches!(result, Err(CompletionError::MissingApiKey)));
    }

    #[test]
    fn test_settings_trim_base_url_and_prefer_explicit_key() {
        let config = CompletionConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..CompletionConfig::default()
        };
        let settings = CompletionSettings::from_config(&config, Some("explicit".to_string()));
        assert_eq!(settings.base_url, "https://api.example.com/v1");
        assert_eq!(settings.api_key, "explicit");
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }
}
