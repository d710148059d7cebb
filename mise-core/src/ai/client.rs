//! OpenAI-compatible chat completions client (OpenRouter by default).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::config::AiConfig;
use super::types::{
    ApiErrorBody, ChatRequest, ChatResponse, CompletionRequest, CompletionResponse,
    ResponseFormat,
};
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API request timed out")]
    Timeout,

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A chat completion backend.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Chat completions over HTTP with a minimum interval between requests.
pub struct OpenRouterClient {
    client: reqwest::Client,
    config: AiConfig,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl OpenRouterClient {
    /// Create a new client from environment configuration.
    pub fn from_env() -> Result<Self, AiError> {
        let config = AiConfig::from_env()?;
        Self::new(config)
    }

    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// Apply rate limiting between requests.
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            let min_interval: Duration = self.config.rate_limit;

            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[async_trait]
impl AiClient for OpenRouterClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
        self.rate_limit().await;

        let body = CompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: Some(request.max_tokens.unwrap_or(self.config.max_tokens)),
            temperature: request.temperature,
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        tracing::debug!(model = %self.config.model, messages = request.messages.len(), "Calling AI API");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(AiError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout
            } else {
                AiError::RequestFailed(e.to_string())
            }
        })?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(AiError::ApiError { status, message });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| AiError::ParseError(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::ParseError("No choices in response".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(AiError::Blocked("content_filter".to_string()));
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AiError::Blocked("empty response content".to_string()))?;

        Ok(ChatResponse {
            content,
            usage: parsed.usage.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
