//! Structural validation of extracted recipes, with feedback retries.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::Settings;
use crate::extractor::RecipeExtractor;
use crate::recipe::Recipe;
use crate::types::{ExtractionEnvelope, ValidationOutcome};

/// Check the fields every usable recipe must have.
///
/// All violations are reported together, joined by `"; "`.
pub fn validate_recipe(recipe: &Recipe) -> ValidationOutcome {
    let mut errors = Vec::new();

    if recipe.metadata.title.trim().is_empty() {
        errors.push("metadata.title is required".to_string());
    }

    if recipe.ingredients.is_empty() {
        errors.push("at least one ingredient is required".to_string());
    }
    for (i, ingredient) in recipe.ingredients.iter().enumerate() {
        if ingredient.name.trim().is_empty() {
            errors.push(format!("ingredients[{}].name is required", i));
        }
    }

    if recipe.instructions.is_empty() {
        errors.push("at least one instruction is required".to_string());
    }
    for (i, instruction) in recipe.instructions.iter().enumerate() {
        if instruction.description.trim().is_empty() {
            errors.push(format!("instructions[{}].description is required", i));
        }
    }

    if errors.is_empty() {
        ValidationOutcome {
            recipe: Some(recipe.clone()),
            valid: true,
            error_message: None,
        }
    } else {
        ValidationOutcome {
            recipe: Some(recipe.clone()),
            valid: false,
            error_message: Some(errors.join("; ")),
        }
    }
}

/// What one validation run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    pub is_recipe: bool,
    pub confidence: f64,
    pub recipes: Vec<Recipe>,
    /// Extractor invocations, including the first one
    pub extractor_calls: u32,
    /// Feedback retries
    pub retries: u32,
    /// The extractor returned no usable answer on its last call
    pub extraction_failed: bool,
}

impl ExtractionOutcome {
    fn not_recipe(confidence: f64, extractor_calls: u32, retries: u32) -> Self {
        Self {
            is_recipe: false,
            confidence,
            recipes: Vec::new(),
            extractor_calls,
            retries,
            extraction_failed: false,
        }
    }
}

/// Runs extraction, validates the result and feeds errors back to the
/// extractor until a valid recipe appears or the retry budget runs out.
pub struct ValidationRetryLoop {
    settings: Arc<Settings>,
    extractor: Arc<dyn RecipeExtractor>,
}

impl ValidationRetryLoop {
    pub fn new(settings: Arc<Settings>, extractor: Arc<dyn RecipeExtractor>) -> Self {
        Self {
            settings,
            extractor,
        }
    }

    pub async fn run(&self, cleaned_html: &str, source_url: &str) -> ExtractionOutcome {
        let max_retries = self.settings.validation.max_retries;
        let now = Utc::now();

        let mut envelope = self.extractor.extract(cleaned_html, source_url).await;
        let mut calls = 1;
        let mut retries = 0;

        if max_retries == 0 {
            return finish(envelope, source_url, now, calls, retries);
        }

        loop {
            if !envelope.is_recipe() {
                return ExtractionOutcome {
                    extraction_failed: envelope.is_failure(),
                    ..ExtractionOutcome::not_recipe(envelope.confidence(), calls, retries)
                };
            }

            let confidence = envelope.confidence();
            let outcomes: Vec<ValidationOutcome> =
                envelope.recipes().iter().map(validate_recipe).collect();
            let valid_count = outcomes.iter().filter(|o| o.valid).count();

            if valid_count > 0 {
                if valid_count < outcomes.len() {
                    tracing::info!(
                        valid = valid_count,
                        invalid = outcomes.len() - valid_count,
                        "Keeping the valid subset of extracted recipes"
                    );
                }
                let recipes = outcomes
                    .into_iter()
                    .filter(|o| o.valid)
                    .filter_map(|o| o.recipe)
                    .map(|r| r.post_process(source_url, now))
                    .collect::<Vec<_>>();
                return ExtractionOutcome {
                    is_recipe: true,
                    confidence,
                    recipes,
                    extractor_calls: calls,
                    retries,
                    extraction_failed: false,
                };
            }

            let feedback = outcomes
                .iter()
                .filter_map(|o| o.error_message.as_deref())
                .collect::<Vec<_>>()
                .join("; ");

            if retries >= max_retries {
                tracing::info!(
                    retries,
                    error = %feedback,
                    "Validation retries exhausted"
                );
                return ExtractionOutcome::not_recipe(confidence, calls, retries);
            }

            let Some(previous) = outcomes.into_iter().find_map(|o| o.recipe) else {
                return ExtractionOutcome::not_recipe(confidence, calls, retries);
            };

            tracing::debug!(attempt = retries + 1, error = %feedback, "Retrying with feedback");
            envelope = self
                .extractor
                .extract_with_feedback(cleaned_html, &previous, &feedback)
                .await;
            calls += 1;
            retries += 1;
        }
    }
}

/// Trust the envelope as returned.
fn finish(
    envelope: ExtractionEnvelope,
    source_url: &str,
    now: chrono::DateTime<Utc>,
    calls: u32,
    retries: u32,
) -> ExtractionOutcome {
    let is_recipe = envelope.is_recipe();
    let confidence = envelope.confidence();
    let extraction_failed = envelope.is_failure();
    let recipes = envelope
        .into_recipes()
        .into_iter()
        .map(|r| r.post_process(source_url, now))
        .collect();

    ExtractionOutcome {
        is_recipe,
        confidence,
        recipes,
        extractor_calls: calls,
        retries,
        extraction_failed,
    }
}
