//! Extractor that replays a fixed queue of envelopes.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::RecipeExtractor;
use crate::recipe::Recipe;
use crate::types::ExtractionEnvelope;

/// One recorded extractor invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorCall {
    Extract {
        cleaned_html: String,
        source_url: String,
    },
    Feedback {
        cleaned_html: String,
        previous_title: String,
        validation_error: String,
    },
}

/// Answers each call with the next queued envelope, or a failure envelope
/// once the queue runs dry.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    queue: Mutex<VecDeque<ExtractionEnvelope>>,
    calls: Mutex<Vec<ExtractorCall>>,
}

impl ScriptedExtractor {
    pub fn new(envelopes: impl IntoIterator<Item = ExtractionEnvelope>) -> Self {
        Self {
            queue: Mutex::new(envelopes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, envelope: ExtractionEnvelope) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(envelope);
        }
    }

    pub fn calls(&self) -> Vec<ExtractorCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn feedback_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ExtractorCall::Feedback { .. }))
            .count()
    }

    /// Error string passed to the most recent feedback call.
    pub fn last_validation_error(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            ExtractorCall::Feedback {
                validation_error, ..
            } => Some(validation_error),
            ExtractorCall::Extract { .. } => None,
        })
    }

    /// Cleaned HTML of every call, in order.
    pub fn payloads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| match c {
                ExtractorCall::Extract { cleaned_html, .. }
                | ExtractorCall::Feedback { cleaned_html, .. } => cleaned_html,
            })
            .collect()
    }

    fn record(&self, call: ExtractorCall) -> ExtractionEnvelope {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(ExtractionEnvelope::failure)
    }
}

#[async_trait]
impl RecipeExtractor for ScriptedExtractor {
    async fn extract(&self, cleaned_html: &str, source_url: &str) -> ExtractionEnvelope {
        self.record(ExtractorCall::Extract {
            cleaned_html: cleaned_html.to_string(),
            source_url: source_url.to_string(),
        })
    }

    async fn extract_with_feedback(
        &self,
        cleaned_html: &str,
        previous_recipe: &Recipe,
        validation_error: &str,
    ) -> ExtractionEnvelope {
        self.record(ExtractorCall::Feedback {
            cleaned_html: cleaned_html.to_string(),
            previous_title: previous_recipe.metadata.title.clone(),
            validation_error: validation_error.to_string(),
        })
    }
}
