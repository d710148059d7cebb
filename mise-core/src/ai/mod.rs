//! Chat completion clients used by the recipe extractor.
//!
//! This module provides:
//! - `AiClient` trait for abstracting AI providers
//! - `OpenRouterClient`, an OpenAI-compatible HTTP implementation
//! - `FakeAiClient` for tests
//! - Prompt templates
//!
//! # Configuration
//!
//! - `MISE_AI_API_KEY` or `OPENROUTER_API_KEY` (required)
//! - `MISE_AI_MODEL`, `MISE_AI_BASE_URL`, `MISE_AI_TIMEOUT_SECS`,
//!   `MISE_AI_RATE_LIMIT_MS`, `MISE_AI_MAX_TOKENS` (optional)

mod client;
mod config;
mod fake;
pub mod prompts;
mod types;

pub use client::{AiClient, AiError, OpenRouterClient};
pub use config::AiConfig;
pub use fake::FakeAiClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
