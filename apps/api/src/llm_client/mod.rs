/// LLM client: the single point of entry for all upstream model calls.
///
/// Speaks the OpenAI-compatible chat-completions protocol with `stream: true`
/// and hands the raw event-stream bytes to the relay. Every failure is mapped
/// to one `LlmError` variant with a stable outward status and code.
use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod events;
pub mod prompts;

/// Raw upstream body, read incrementally by the relay.
pub type ByteStream = BoxStream<'static, Result<Bytes, LlmError>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream rejected credentials (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("upstream denied access (status {status}): {message}")]
    Permission { status: u16, message: String },

    #[error("upstream rate limited the request: {message}")]
    RateLimited {
        retry_after: Option<u64>,
        message: String,
    },

    #[error("upstream service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("upstream service unavailable: {message}")]
    Unavailable { message: String },

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            LlmError::Malformed(e.to_string())
        } else {
            LlmError::Network(e)
        }
    }
}

impl LlmError {
    /// Classifies a non-success upstream status.
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let message = serde_json::from_str::<ProviderErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        match status {
            401 => LlmError::Authentication { status, message },
            403 => LlmError::Permission { status, message },
            429 => LlmError::RateLimited {
                retry_after,
                message,
            },
            503 => LlmError::Unavailable { message },
            _ => LlmError::Service { status, message },
        }
    }

    /// Status returned to our own caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LlmError::Authentication { .. } | LlmError::Permission { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LlmError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            LlmError::Service { .. } => StatusCode::BAD_GATEWAY,
            LlmError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LlmError::Timeout(_) | LlmError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
            LlmError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LlmError::Authentication { .. } => "UPSTREAM_AUTH_ERROR",
            LlmError::Permission { .. } => "UPSTREAM_PERMISSION_ERROR",
            LlmError::RateLimited { .. } => "RATE_LIMITED",
            LlmError::Service { .. } => "UPSTREAM_SERVICE_ERROR",
            LlmError::Unavailable { .. } => "UPSTREAM_UNAVAILABLE",
            LlmError::Timeout(_) => "UPSTREAM_TIMEOUT",
            LlmError::Network(_) => "UPSTREAM_NETWORK_ERROR",
            LlmError::Malformed(_) => "MALFORMED_RESPONSE",
        }
    }

    /// Message safe to show end users; upstream details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            LlmError::Authentication { .. } | LlmError::Permission { .. } => {
                "Chat service is not available. Please check configuration."
            }
            LlmError::RateLimited { .. } => {
                "The AI service is receiving too many requests. Please try again shortly."
            }
            LlmError::Service { .. } | LlmError::Unavailable { .. } => {
                "Failed to get response from AI service"
            }
            LlmError::Timeout(_) | LlmError::Network(_) => "The AI service did not respond in time",
            LlmError::Malformed(_) => "The AI service returned an unexpected response",
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// The single upstream client used by the chat endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        // No overall request timeout: it would also cut long streams short.
        // The initial response is bounded in `open_stream`, reads by the relay.
        let client = Client::builder()
            .connect_timeout(config.llm_timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.llm_api_key.clone().unwrap_or_default(),
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: config.llm_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Starts a streamed completion and returns the raw event-stream body.
    ///
    /// No retries happen here: a failure is classified and returned at once.
    pub async fn open_stream(&self, system: &str, message: &str) -> Result<ByteStream, LlmError> {
        let request_body = CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: system,
                },
                CompletionMessage {
                    role: "user",
                    content: message,
                },
            ],
            stream: true,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let send = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .json(&request_body)
            .send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result.map_err(|e| match LlmError::from(e) {
                LlmError::Timeout(_) => LlmError::Timeout(self.timeout),
                other => other,
            })?,
            Err(_) => return Err(LlmError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            // A stalled error body must not outlive the response timeout.
            let body = match tokio::time::timeout(self.timeout, response.text()).await {
                Ok(text) => text.unwrap_or_default(),
                Err(_) => {
                    warn!("LLM API error body not received within {:?}", self.timeout);
                    String::new()
                }
            };
            warn!("LLM API returned {}: {}", status, body);
            return Err(LlmError::from_status(status.as_u16(), &body, retry_after));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("event-stream") {
            return Err(LlmError::Malformed(format!(
                "expected an event stream, got content-type '{content_type}'"
            )));
        }

        debug!("LLM stream opened (model: {})", self.model);

        Ok(response.bytes_stream().map(|r| r.map_err(LlmError::from)).boxed())
    }
}
