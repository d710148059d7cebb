//! Fake AI client for testing.
//!
//! Returns canned responses based on prompt matching, so extraction can be
//! exercised without network access or API costs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::client::{AiClient, AiError};
use super::types::{ChatRequest, ChatResponse, Usage};

/// Responses are matched by checking if the prompt contains a registered
/// substring (case-insensitive). Unmatched prompts get the default response,
/// or an error when none is set.
#[derive(Debug, Default)]
pub struct FakeAiClient {
    responses: RwLock<Vec<(String, String)>>,
    default_response: Option<String>,
    calls: AtomicUsize,
    prompts: RwLock<Vec<String>>,
}

impl FakeAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let client = Self::new();
        client.add_response(prompt_contains, response);
        client
    }

    /// Register a response. Earlier registrations win when several match.
    pub fn add_response(&self, prompt_contains: &str, response: &str) {
        if let Ok(mut responses) = self.responses.write() {
            responses.push((prompt_contains.to_lowercase(), response.to_string()));
        }
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt seen so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.prompt_text();
        if let Ok(mut prompts) = self.prompts.write() {
            prompts.push(prompt.clone());
        }

        let prompt_lower = prompt.to_lowercase();
        let matched = self.responses.read().ok().and_then(|responses| {
            responses
                .iter()
                .find(|(pattern, _)| prompt_lower.contains(pattern.as_str()))
                .map(|(_, response)| response.clone())
        });

        match matched.or_else(|| self.default_response.clone()) {
            Some(content) => Ok(ChatResponse {
                content,
                usage: Usage::default(),
                finish_reason: Some("stop".to_string()),
            }),
            None => Err(AiError::RequestFailed(format!(
                "FakeAiClient: no response configured for prompt (first 100 chars): {}",
                prompt.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}
