//! Adaptive cleaning: escalate to less aggressive cleaning when the model
//! thinks a recipe is there but could not extract one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::cleaning::CleaningCascade;
use crate::config::Settings;
use crate::extractor::RecipeExtractor;
use crate::types::{CleaningStrategy, PreprocessingResult};
use crate::validation::{ExtractionOutcome, ValidationRetryLoop};

/// Per-request pipeline metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub initial_strategy: CleaningStrategy,
    pub final_strategy: CleaningStrategy,
    /// Reduction ratio of the payload the final result came from
    pub reduction_ratio: f64,
    /// Extraction runs per cleaning strategy
    pub strategy_attempts: BTreeMap<CleaningStrategy, u32>,
    pub validation_retries: u32,
    pub extractor_calls: u32,
    pub final_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorOutcome {
    pub extraction: ExtractionOutcome,
    pub metrics: PipelineMetrics,
}

pub struct AdaptiveCleaningOrchestrator {
    settings: Arc<Settings>,
    cascade: CleaningCascade,
    validation: ValidationRetryLoop,
}

impl AdaptiveCleaningOrchestrator {
    pub fn new(settings: Arc<Settings>, extractor: Arc<dyn RecipeExtractor>) -> Self {
        Self {
            cascade: CleaningCascade::new(settings.clone()),
            validation: ValidationRetryLoop::new(settings.clone(), extractor),
            settings,
        }
    }

    pub async fn run(&self, raw_html: &str, source_url: &str) -> OrchestratorOutcome {
        let initial = self.cascade.reduce(raw_html);
        let mut tracker = Tracker::new(initial.strategy_used);

        let mut current = initial;
        let mut outcome = tracker.record(&current, self.validate(&current, source_url).await);
        let mut raw_tried = is_raw(&current, raw_html);

        if outcome.is_recipe || !self.settings.adaptive.enabled {
            return tracker.finish(outcome, &current);
        }

        let threshold = self.settings.adaptive.confidence_threshold;
        let order = CleaningStrategy::ESCALATION_ORDER;
        let mut index = current.strategy_used.escalation_index();

        while index + 1 < order.len() {
            if outcome.confidence < threshold {
                tracing::debug!(
                    strategy = %current.strategy_used,
                    confidence = outcome.confidence,
                    threshold,
                    "Confidence below threshold, not escalating"
                );
                return tracker.finish(outcome, &current);
            }

            index += 1;
            let candidate = self.cascade.apply_one(raw_html, order[index]);
            let candidate_is_raw = is_raw(&candidate, raw_html);
            if candidate_is_raw && raw_tried {
                tracing::debug!(
                    strategy = %order[index],
                    "Strategy degraded to raw input already tried, skipping"
                );
                continue;
            }

            tracing::info!(
                from = %current.strategy_used,
                to = %order[index],
                confidence = outcome.confidence,
                "Escalating cleaning strategy"
            );

            current = candidate;
            raw_tried |= candidate_is_raw;
            outcome = tracker.record(&current, self.validate(&current, source_url).await);
            if outcome.is_recipe {
                return tracker.finish(outcome, &current);
            }
        }

        tracker.finish(outcome, &current)
    }

    async fn validate(&self, result: &PreprocessingResult, source_url: &str) -> ExtractionOutcome {
        self.validation.run(&result.cleaned_html, source_url).await
    }
}

fn is_raw(result: &PreprocessingResult, raw_html: &str) -> bool {
    matches!(
        result.strategy_used,
        CleaningStrategy::Fallback | CleaningStrategy::Disabled
    ) && result.cleaned_html == raw_html
}

/// Accumulates metrics across attempts.
struct Tracker {
    initial_strategy: CleaningStrategy,
    strategy_attempts: BTreeMap<CleaningStrategy, u32>,
    validation_retries: u32,
    extractor_calls: u32,
}

impl Tracker {
    fn new(initial_strategy: CleaningStrategy) -> Self {
        Self {
            initial_strategy,
            strategy_attempts: BTreeMap::new(),
            validation_retries: 0,
            extractor_calls: 0,
        }
    }

    fn record(&mut self, result: &PreprocessingResult, outcome: ExtractionOutcome) -> ExtractionOutcome {
        *self.strategy_attempts.entry(result.strategy_used).or_default() += 1;
        self.validation_retries += outcome.retries;
        self.extractor_calls += outcome.extractor_calls;
        outcome
    }

    fn finish(self, extraction: ExtractionOutcome, last: &PreprocessingResult) -> OrchestratorOutcome {
        let metrics = PipelineMetrics {
            initial_strategy: self.initial_strategy,
            final_strategy: last.strategy_used,
            reduction_ratio: last.reduction_ratio,
            strategy_attempts: self.strategy_attempts,
            validation_retries: self.validation_retries,
            extractor_calls: self.extractor_calls,
            final_confidence: extraction.confidence,
        };
        OrchestratorOutcome {
            extraction,
            metrics,
        }
    }
}
