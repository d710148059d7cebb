use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::recipe::Recipe;

/// HTML reduction strategies.
///
/// The order of [`CleaningStrategy::ESCALATION_ORDER`] is both the cascade
/// precedence and the order the adaptive loop steps through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStrategy {
    StructuredData,
    SectionBased,
    ContentFilter,
    Fallback,
    Disabled,
}

impl CleaningStrategy {
    /// Most aggressive first; `Fallback` always succeeds.
    pub const ESCALATION_ORDER: &'static [CleaningStrategy] = &[
        CleaningStrategy::StructuredData,
        CleaningStrategy::SectionBased,
        CleaningStrategy::ContentFilter,
        CleaningStrategy::Fallback,
    ];

    /// Position in the escalation order. `Disabled` sits past the end.
    pub fn escalation_index(&self) -> usize {
        Self::ESCALATION_ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or(Self::ESCALATION_ORDER.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningStrategy::StructuredData => "structured_data",
            CleaningStrategy::SectionBased => "section_based",
            CleaningStrategy::ContentFilter => "content_filter",
            CleaningStrategy::Fallback => "fallback",
            CleaningStrategy::Disabled => "disabled",
        }
    }

}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown cleaning strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for CleaningStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured_data" => Ok(CleaningStrategy::StructuredData),
            "section_based" => Ok(CleaningStrategy::SectionBased),
            "content_filter" => Ok(CleaningStrategy::ContentFilter),
            "fallback" => Ok(CleaningStrategy::Fallback),
            "disabled" => Ok(CleaningStrategy::Disabled),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for CleaningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingResult {
    pub cleaned_html: String,
    /// Size of the input in bytes
    pub original_size: usize,
    /// Size of `cleaned_html` in bytes
    pub cleaned_size: usize,
    /// Fraction of the input removed, in `[0, 1]`
    pub reduction_ratio: f64,
    pub strategy_used: CleaningStrategy,
}

impl PreprocessingResult {
    pub fn new(original: &str, cleaned: String, strategy_used: CleaningStrategy) -> Self {
        let original_size = original.len();
        let cleaned_size = cleaned.len();
        let reduction_ratio = if original_size > 0 && cleaned_size < original_size {
            (original_size - cleaned_size) as f64 / original_size as f64
        } else {
            0.0
        };

        Self {
            cleaned_html: cleaned,
            original_size,
            cleaned_size,
            reduction_ratio,
            strategy_used,
        }
    }

    /// The input passed through untouched.
    pub fn passthrough(original: &str, strategy_used: CleaningStrategy) -> Self {
        Self::new(original, original.to_string(), strategy_used)
    }
}

/// Normalized answer from the extractor.
///
/// Fields are private so the `is_recipe <=> !recipes.is_empty()`
/// invariant cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionEnvelope {
    is_recipe: bool,
    confidence: f64,
    recipes: Vec<Recipe>,
    /// Set when no usable answer came back at all
    #[serde(skip)]
    failed: bool,
}

impl ExtractionEnvelope {
    /// Build an envelope, normalizing whatever the model claimed.
    ///
    /// A recipe claim with no recipes becomes a negative answer; a negative
    /// answer drops any recipes. Confidence is clamped to `[0, 1]` and
    /// non-finite values become `0.0`.
    pub fn new(is_recipe: bool, confidence: f64, recipes: Vec<Recipe>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let is_recipe = is_recipe && !recipes.is_empty();
        let recipes = if is_recipe { recipes } else { Vec::new() };

        Self {
            is_recipe,
            confidence,
            recipes,
            failed: false,
        }
    }

    pub fn not_recipe(confidence: f64) -> Self {
        Self::new(false, confidence, Vec::new())
    }

    /// Outcome used for any transport or parsing failure.
    pub fn failure() -> Self {
        Self {
            failed: true,
            ..Self::not_recipe(0.0)
        }
    }

    /// True for [`ExtractionEnvelope::failure`], false for any answer the
    /// model actually gave, including a zero-confidence "not a recipe".
    pub fn is_failure(&self) -> bool {
        self.failed
    }

    pub fn is_recipe(&self) -> bool {
        self.is_recipe
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn into_recipes(self) -> Vec<Recipe> {
        self.recipes
    }
}

/// Result of validating one recipe in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub recipe: Option<Recipe>,
    pub valid: bool,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeData;

    fn recipe() -> Recipe {
        Recipe::from_data(RecipeData::default())
    }

    #[test]
    fn test_reduction_ratio() {
        let result = PreprocessingResult::new("0123456789", "01".to_string(), CleaningStrategy::SectionBased);
        assert_eq!(result.original_size, 10);
        assert_eq!(result.cleaned_size, 2);
        assert!((result.reduction_ratio - 0.8).abs() < 1e-9);

        let empty = PreprocessingResult::passthrough("", CleaningStrategy::Fallback);
        assert_eq!(empty.reduction_ratio, 0.0);

        let grown = PreprocessingResult::new("ab", "abcd".to_string(), CleaningStrategy::ContentFilter);
        assert_eq!(grown.reduction_ratio, 0.0);
    }

    #[test]
    fn test_escalation_index() {
        assert_eq!(CleaningStrategy::StructuredData.escalation_index(), 0);
        assert_eq!(CleaningStrategy::Fallback.escalation_index(), 3);
        assert_eq!(CleaningStrategy::Disabled.escalation_index(), 4);
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in CleaningStrategy::ESCALATION_ORDER
            .iter()
            .chain(std::iter::once(&CleaningStrategy::Disabled))
        {
            assert_eq!(strategy.as_str().parse::<CleaningStrategy>(), Ok(*strategy));
        }
        assert_eq!(
            "aggressive".parse::<CleaningStrategy>(),
            Err(UnknownStrategy("aggressive".to_string()))
        );
    }

    #[test]
    fn test_envelope_recipe_claim_without_recipes_is_negative() {
        let envelope = ExtractionEnvelope::new(true, 0.9, vec![]);
        assert!(!envelope.is_recipe());
        assert_eq!(envelope.confidence(), 0.9);
    }

    #[test]
    fn test_envelope_negative_claim_drops_recipes() {
        let envelope = ExtractionEnvelope::new(false, 0.4, vec![recipe()]);
        assert!(!envelope.is_recipe());
        assert!(envelope.recipes().is_empty());
    }

    #[test]
    fn test_failure_is_distinct_from_a_negative_answer() {
        let failure = ExtractionEnvelope::failure();
        assert!(failure.is_failure());
        assert!(!failure.is_recipe());
        assert_eq!(failure.confidence(), 0.0);
        assert!(!ExtractionEnvelope::not_recipe(0.0).is_failure());
        assert_ne!(failure, ExtractionEnvelope::not_recipe(0.0));
    }

    #[test]
    fn test_envelope_clamps_confidence() {
        assert_eq!(ExtractionEnvelope::not_recipe(1.7).confidence(), 1.0);
        assert_eq!(ExtractionEnvelope::not_recipe(-0.3).confidence(), 0.0);
        assert_eq!(ExtractionEnvelope::not_recipe(f64::NAN).confidence(), 0.0);
    }
}
