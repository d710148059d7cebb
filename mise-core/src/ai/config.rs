//! Extractor transport configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::config::ConfigError;

/// Default OpenRouter base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model to use.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default rate limit between requests in milliseconds.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 500;

pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Configuration for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Per-request timeout, enforced by the HTTP client.
    pub timeout: Duration,
    /// Minimum delay between consecutive requests.
    pub rate_limit: Duration,
    pub max_tokens: u32,
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_limit: Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `MISE_AI_API_KEY` (or `OPENROUTER_API_KEY`)
    ///
    /// Optional:
    /// - `MISE_AI_MODEL` (default: "openai/gpt-4o-mini")
    /// - `MISE_AI_BASE_URL` (default: "https://openrouter.ai/api/v1")
    /// - `MISE_AI_TIMEOUT_SECS` (default: 60)
    /// - `MISE_AI_RATE_LIMIT_MS` (default: 500)
    /// - `MISE_AI_MAX_TOKENS` (default: 8192)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("MISE_AI_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("MISE_AI_API_KEY".to_string()))?;

        let mut config = Self::new(api_key);

        if let Ok(model) = env::var("MISE_AI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = env::var("MISE_AI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_env::<u64>("MISE_AI_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env::<u64>("MISE_AI_RATE_LIMIT_MS")? {
            config.rate_limit = Duration::from_millis(ms);
        }
        if let Some(max_tokens) = parse_env::<u32>("MISE_AI_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
