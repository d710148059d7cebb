//! HTML reduction cascade.
//!
//! Strategies run most-aggressive first and the first one that produces a
//! usable payload wins:
//! 1. Structured data (JSON-LD / microdata Recipe objects)
//! 2. Best-scoring content section
//! 3. Boilerplate filtering of the whole body
//! 4. The raw input

pub mod content_filter;
pub mod section;
pub mod structured_data;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use scraper::Html;

use crate::config::Settings;
use crate::types::{CleaningStrategy, PreprocessingResult};

/// Runs the cleaning strategies configured in [`Settings::cascade`].
#[derive(Debug, Clone)]
pub struct CleaningCascade {
    settings: Arc<Settings>,
}

impl CleaningCascade {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    fn is_enabled(&self, strategy: CleaningStrategy) -> bool {
        let cascade = &self.settings.cascade;
        match strategy {
            CleaningStrategy::StructuredData => cascade.structured_data,
            CleaningStrategy::SectionBased => cascade.section_based,
            CleaningStrategy::ContentFilter => cascade.content_filter,
            CleaningStrategy::Fallback => true,
            CleaningStrategy::Disabled => false,
        }
    }

    /// Run the cascade. Never fails: the worst case is the raw input tagged `Fallback`.
    pub fn reduce(&self, html: &str) -> PreprocessingResult {
        if !self.settings.cascade.enabled {
            return PreprocessingResult::passthrough(html, CleaningStrategy::Disabled);
        }

        for &strategy in CleaningStrategy::ESCALATION_ORDER {
            if strategy == CleaningStrategy::Fallback || !self.is_enabled(strategy) {
                continue;
            }
            if let Some(cleaned) = self.run_guarded(strategy, html) {
                let result = PreprocessingResult::new(html, cleaned, strategy);
                tracing::info!(
                    strategy = %strategy,
                    original_size = result.original_size,
                    cleaned_size = result.cleaned_size,
                    reduction_ratio = result.reduction_ratio,
                    "HTML reduced"
                );
                return result;
            }
            tracing::debug!(strategy = %strategy, "Strategy produced no usable output");
        }

        tracing::info!(size = html.len(), "No strategy reduced the HTML, using raw input");
        PreprocessingResult::passthrough(html, CleaningStrategy::Fallback)
    }

    /// Apply exactly one strategy, ignoring cascade order and enablement.
    ///
    /// Falls back to the raw input tagged `Fallback` when the strategy has no
    /// usable output or is itself `Fallback`/`Disabled`.
    pub fn apply_one(&self, html: &str, strategy: CleaningStrategy) -> PreprocessingResult {
        match strategy {
            CleaningStrategy::Fallback | CleaningStrategy::Disabled => {
                PreprocessingResult::passthrough(html, CleaningStrategy::Fallback)
            }
            strategy => match self.run_guarded(strategy, html) {
                Some(cleaned) => PreprocessingResult::new(html, cleaned, strategy),
                None => {
                    tracing::debug!(strategy = %strategy, "Strategy produced no usable output");
                    PreprocessingResult::passthrough(html, CleaningStrategy::Fallback)
                }
            },
        }
    }

    /// The single place where an unexpected strategy failure is absorbed.
    fn run_guarded(&self, strategy: CleaningStrategy, html: &str) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_strategy(strategy, html))) {
            Ok(output) => output,
            Err(_) => {
                tracing::warn!(strategy = %strategy, "Cleaning strategy panicked");
                None
            }
        }
    }

    fn run_strategy(&self, strategy: CleaningStrategy, html: &str) -> Option<String> {
        let cascade = &self.settings.cascade;
        match strategy {
            CleaningStrategy::StructuredData => {
                structured_data::extract(html, cascade.min_completeness)
            }
            CleaningStrategy::SectionBased => {
                let document = Html::parse_document(html);
                section::extract(&document, cascade)
            }
            CleaningStrategy::ContentFilter => {
                let document = Html::parse_document(html);
                content_filter::extract(&document, cascade.min_output_size)
            }
            CleaningStrategy::Fallback | CleaningStrategy::Disabled => None,
        }
    }
}
