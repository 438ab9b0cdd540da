use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("cannot reach model service at {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("model service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed completion envelope: {0}")]
    Decode(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("http client error: {0}")]
    Http(String),
}

/// External generative-model client.
///
/// Sends a system and user instruction; the response must be a single JSON
/// object, returned here as raw text. Whether that text actually parses and
/// conforms to the stage's shape is the caller's job.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, GatewayError>;
}

/// Chat-completions client for an OpenAI-compatible service.
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// The model name requests are sent with.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

/// Request body for POST /chat/completions
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

/// Response body from POST /chat/completions
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                format: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GatewayError::Connection(self.config.base_url.clone())
                } else if e.is_timeout() {
                    GatewayError::Timeout(self.config.timeout_secs)
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(content)
    }
}

/// Scripted gateway for testing.
///
/// Returns canned responses in order, repeating the final entry once the
/// script is exhausted, and counts every call.
pub struct MockGateway {
    script: Mutex<Vec<Result<String, GatewayError>>>,
    calls: AtomicUsize,
}

impl MockGateway {
    /// A gateway that always returns `response`.
    pub fn new(response: &str) -> Self {
        Self::with_script(vec![Ok(response.to_string())])
    }

    /// A gateway that replays `script` in order. Must be non-empty.
    pub fn with_script(script: Vec<Result<String, GatewayError>>) -> Self {
        assert!(!script.is_empty(), "mock script must not be empty");
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// A gateway that always fails with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self::with_script(vec![Err(error)])
    }

    /// How many times `complete_json` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn complete_json(&self, _system: &str, _user: &str) -> Result<String, GatewayError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        script[index.min(script.len() - 1)].clone()
    }
}
