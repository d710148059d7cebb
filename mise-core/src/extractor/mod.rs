//! Recipe extraction from cleaned HTML.
//!
//! [`RecipeExtractor`] is infallible by contract: every transport, parsing or
//! safety failure becomes a negative envelope with zero confidence, so the
//! retry loops treat all outcomes the same way.

mod scripted;

pub use scripted::{ExtractorCall, ScriptedExtractor};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::ai::prompts::extract_recipe::{
    render_extract_prompt, render_feedback_prompt, render_system_prompt,
    EXTRACT_RECIPE_PROMPT_NAME,
};
use crate::ai::{AiClient, ChatMessage, ChatRequest};
use crate::recipe::{null_as_default, Recipe, RecipeData};
use crate::types::ExtractionEnvelope;

#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    /// First extraction attempt for a page.
    async fn extract(&self, cleaned_html: &str, source_url: &str) -> ExtractionEnvelope;

    /// Retry with the rejected recipe and the validation errors as feedback.
    async fn extract_with_feedback(
        &self,
        cleaned_html: &str,
        previous_recipe: &Recipe,
        validation_error: &str,
    ) -> ExtractionEnvelope;
}

/// The envelope exactly as the model sent it. Every field has a default and
/// unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnvelope {
    #[serde(deserialize_with = "null_as_default")]
    is_recipe: bool,
    #[serde(deserialize_with = "null_as_default")]
    recipe_confidence: f64,
    internal_reasoning: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    recipes: Vec<serde_json::Value>,
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // The opening line may carry a language tag of any case.
    match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim_start().starts_with('{') => body.trim(),
        _ => rest.trim(),
    }
}

/// Map raw model output to a normalized envelope.
///
/// Recipes that cannot be deserialized are dropped individually; an
/// unparsable envelope is a failure.
pub fn parse_envelope(content: &str) -> ExtractionEnvelope {
    let raw: RawEnvelope = match serde_json::from_str(strip_code_fence(content)) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Unparsable extraction response");
            return ExtractionEnvelope::failure();
        }
    };

    if let Some(reasoning) = &raw.internal_reasoning {
        tracing::debug!(reasoning = %reasoning, "Model reasoning");
    }

    let total = raw.recipes.len();
    let recipes: Vec<Recipe> = raw
        .recipes
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RecipeData>(value) {
            Ok(data) => Some(Recipe::from_data(data)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed recipe from response");
                None
            }
        })
        .collect();

    if recipes.len() < total {
        tracing::debug!(kept = recipes.len(), total, "Some recipes were malformed");
    }

    ExtractionEnvelope::new(raw.is_recipe, raw.recipe_confidence, recipes)
}

/// Extractor backed by a chat completion model.
pub struct LlmRecipeExtractor {
    client: Arc<dyn AiClient>,
    temperature: Option<f32>,
}

impl LlmRecipeExtractor {
    pub fn new(client: Arc<dyn AiClient>) -> Self {
        Self {
            client,
            temperature: Some(0.0),
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    async fn run(&self, user_prompt: String, attempt: &'static str) -> ExtractionEnvelope {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(render_system_prompt()),
                ChatMessage::user(user_prompt),
            ],
            max_tokens: None,
            temperature: self.temperature,
            json_response: true,
        };

        match self.client.complete(request).await {
            Ok(response) => {
                tracing::debug!(
                    prompt_name = EXTRACT_RECIPE_PROMPT_NAME,
                    attempt,
                    model = self.client.model_name(),
                    total_tokens = response.usage.total_tokens,
                    "Extraction response received"
                );
                parse_envelope(&response.content)
            }
            Err(e) => {
                tracing::warn!(
                    prompt_name = EXTRACT_RECIPE_PROMPT_NAME,
                    attempt,
                    error = %e,
                    "Extraction request failed"
                );
                ExtractionEnvelope::failure()
            }
        }
    }
}

#[async_trait]
impl RecipeExtractor for LlmRecipeExtractor {
    async fn extract(&self, cleaned_html: &str, source_url: &str) -> ExtractionEnvelope {
        self.run(render_extract_prompt(cleaned_html, source_url), "initial")
            .await
    }

    async fn extract_with_feedback(
        &self,
        cleaned_html: &str,
        previous_recipe: &Recipe,
        validation_error: &str,
    ) -> ExtractionEnvelope {
        let previous = serde_json::to_string_pretty(previous_recipe).unwrap_or_default();
        self.run(
            render_feedback_prompt(cleaned_html, &previous, validation_error),
            "feedback",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FakeAiClient;

    const CHILI_RESPONSE: &str = r#"{
        "is_recipe": true,
        "recipe_confidence": 0.93,
        "internal_reasoning": "Has ingredients and steps",
        "model_metadata": {"ignored": true},
        "recipes": [{
            "metadata": {"title": "Chili"},
            "ingredients": [{"name": "beans", "amount": 2, "unit": "cans"}],
            "instructions": [{"step": 1, "description": "Simmer for an hour."}]
        }]
    }"#;

    #[test]
    fn test_parse_envelope_ignores_unknown_fields() {
        let envelope = parse_envelope(CHILI_RESPONSE);
        assert!(envelope.is_recipe());
        assert_eq!(envelope.confidence(), 0.93);
        assert_eq!(envelope.recipes().len(), 1);
        let recipe = &envelope.recipes()[0];
        assert!(recipe.is_recipe);
        assert_eq!(recipe.ingredients[0].amount.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_envelope_strips_code_fence() {
        let fenced = format!("```json\n{CHILI_RESPONSE}\n```");
        assert!(parse_envelope(&fenced).is_recipe());
    }

    #[test]
    fn test_parse_envelope_strips_tagged_fences() {
        for tag in ["JSON", "Json", ""] {
            let fenced = format!("```{tag}\n{CHILI_RESPONSE}\n```");
            assert!(parse_envelope(&fenced).is_recipe(), "tag {tag:?}");
        }
    }

    #[test]
    fn test_parse_envelope_treats_null_as_missing() {
        let envelope = parse_envelope(
            r#"{"is_recipe": true, "recipe_confidence": null, "internal_reasoning": null,
                "recipes": [{
                    "metadata": {"title": "Chili", "keywords": null},
                    "ingredients": [{"name": "beans", "optional": null, "substitutions": null}],
                    "equipment": null,
                    "instructions": [{"step": 1, "description": "Simmer.", "media": null}]
                }]}"#,
        );
        assert!(envelope.is_recipe());
        assert_eq!(envelope.confidence(), 0.0);
        assert_eq!(envelope.recipes().len(), 1);

        let empty = parse_envelope(r#"{"is_recipe": null, "recipe_confidence": 0.4, "recipes": null}"#);
        assert!(!empty.is_recipe());
        assert_eq!(empty.confidence(), 0.4);
    }

    #[test]
    fn test_parse_envelope_defaults_missing_fields() {
        let envelope = parse_envelope("{}");
        assert!(!envelope.is_recipe());
        assert_eq!(envelope.confidence(), 0.0);
    }

    #[test]
    fn test_parse_envelope_enforces_invariant() {
        let claimed = parse_envelope(r#"{"is_recipe": true, "recipe_confidence": 0.8, "recipes": []}"#);
        assert!(!claimed.is_recipe());
        assert_eq!(claimed.confidence(), 0.8);

        let denied = parse_envelope(
            r#"{"is_recipe": false, "recipe_confidence": 0.3,
                "recipes": [{"metadata": {"title": "Stray"}}]}"#,
        );
        assert!(!denied.is_recipe());
        assert!(denied.recipes().is_empty());
    }

    #[test]
    fn test_parse_envelope_drops_malformed_items() {
        let envelope = parse_envelope(
            r#"{"is_recipe": true, "recipe_confidence": 0.9, "recipes": [
                {"metadata": {"title": "Good"}},
                {"metadata": "not an object"},
                42
            ]}"#,
        );
        assert_eq!(envelope.recipes().len(), 1);
        assert_eq!(envelope.recipes()[0].metadata.title, "Good");
    }

    #[test]
    fn test_parse_envelope_garbage_is_failure() {
        let envelope = parse_envelope("I'm sorry, I can't help with that.");
        assert_eq!(envelope, ExtractionEnvelope::failure());
    }

    #[tokio::test]
    async fn test_llm_extractor_maps_response() {
        let client = Arc::new(FakeAiClient::with_response("Page markup", CHILI_RESPONSE));
        let extractor = LlmRecipeExtractor::new(client.clone());

        let envelope = extractor
            .extract("<h1>Chili</h1>", "https://example.com/chili")
            .await;

        assert!(envelope.is_recipe());
        assert_eq!(client.calls(), 1);
        assert!(client.prompts()[0].contains("https://example.com/chili"));
    }

    #[tokio::test]
    async fn test_llm_extractor_transport_failure_is_zero_confidence() {
        let client = Arc::new(FakeAiClient::new());
        let extractor = LlmRecipeExtractor::new(client);

        let envelope = extractor.extract("<p>x</p>", "https://example.com/").await;
        assert_eq!(envelope, ExtractionEnvelope::failure());
    }

    #[tokio::test]
    async fn test_llm_extractor_feedback_includes_error() {
        let client = Arc::new(FakeAiClient::new().with_default_response(
            r#"{"is_recipe": false, "recipe_confidence": 0.6, "recipes": []}"#,
        ));
        let extractor = LlmRecipeExtractor::new(client.clone());

        let envelope = extractor
            .extract_with_feedback("<p>x</p>", &Recipe::default(), "metadata.title is required")
            .await;

        assert!(!envelope.is_recipe());
        assert_eq!(envelope.confidence(), 0.6);
        assert!(client.prompts()[0].contains("metadata.title is required"));
    }
}
