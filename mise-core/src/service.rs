//! End-to-end extraction: hash, cache lookup, adaptive extraction, store.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::{CacheEntry, RecipeCache};
use crate::config::Settings;
use crate::error::{CacheError, PipelineError};
use crate::extractor::RecipeExtractor;
use crate::orchestrator::{AdaptiveCleaningOrchestrator, PipelineMetrics};
use crate::recipe::Recipe;
use crate::url::{ContentHasher, UrlNormalizer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub content_hash: String,
    pub source_url: String,
    pub is_recipe: bool,
    /// `None` when served from cache
    pub confidence: Option<f64>,
    pub recipes: Vec<Recipe>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PipelineMetrics>,
}

type InFlight = DashMap<String, Arc<Mutex<()>>>;

/// Held while one request for a hash runs. Dropping it releases waiters and
/// removes the map entry once nobody else holds it.
struct FlightSlot<'a> {
    in_flight: &'a InFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> FlightSlot<'a> {
    async fn acquire(in_flight: &'a InFlight, key: &str) -> FlightSlot<'a> {
        let lock = in_flight.entry(key.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        FlightSlot {
            in_flight,
            key: key.to_string(),
            guard: Some(guard),
        }
    }
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.in_flight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct RecipeExtractionService {
    hasher: ContentHasher,
    orchestrator: AdaptiveCleaningOrchestrator,
    cache: Arc<dyn RecipeCache>,
    in_flight: InFlight,
}

impl RecipeExtractionService {
    pub fn new(
        settings: Arc<Settings>,
        extractor: Arc<dyn RecipeExtractor>,
        cache: Arc<dyn RecipeCache>,
    ) -> Self {
        let hasher = ContentHasher::new(
            UrlNormalizer::new(settings.tracking_params.as_slice()),
            settings.hash_memo_capacity,
        );
        Self {
            hasher,
            orchestrator: AdaptiveCleaningOrchestrator::new(settings, extractor),
            cache,
            in_flight: DashMap::new(),
        }
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    /// Extract the recipes on `raw_html`, fetched from `url`.
    ///
    /// Only a malformed or blank URL is an error; extraction and cache
    /// problems degrade to a "not a recipe" report or a cache miss. A run
    /// where the extractor never answered is reported but not cached.
    pub async fn extract(&self, url: &str, raw_html: &str) -> Result<ExtractionReport, PipelineError> {
        let content_hash = self.hasher.hash(url)?;
        let _slot = FlightSlot::acquire(&self.in_flight, &content_hash).await;

        if let Some(report) = self.cached_report(&content_hash, url).await {
            tracing::info!(content_hash = %content_hash, is_recipe = report.is_recipe, "Cache hit");
            return Ok(report);
        }

        let outcome = self.orchestrator.run(raw_html, url).await;
        let extraction = outcome.extraction;
        let metrics = outcome.metrics;

        if extraction.extraction_failed {
            tracing::warn!(content_hash = %content_hash, "Extractor gave no answer, not caching");
        } else if let Err(e) = self
            .cache
            .store(&content_hash, url, Some(&extraction.recipes))
            .await
        {
            tracing::warn!(content_hash = %content_hash, error = %e, "Failed to cache extraction result");
        }

        tracing::info!(
            content_hash = %content_hash,
            is_recipe = extraction.is_recipe,
            recipes = extraction.recipes.len(),
            initial_strategy = %metrics.initial_strategy,
            final_strategy = %metrics.final_strategy,
            reduction_ratio = metrics.reduction_ratio,
            strategy_attempts = ?metrics.strategy_attempts,
            validation_retries = metrics.validation_retries,
            extractor_calls = metrics.extractor_calls,
            final_confidence = metrics.final_confidence,
            "Extraction finished"
        );

        Ok(ExtractionReport {
            content_hash,
            source_url: url.to_string(),
            is_recipe: extraction.is_recipe,
            confidence: Some(extraction.confidence),
            recipes: extraction.recipes,
            from_cache: false,
            metrics: Some(metrics),
        })
    }

    /// A usable cached report, or `None` to run the pipeline.
    async fn cached_report(&self, content_hash: &str, url: &str) -> Option<ExtractionReport> {
        let entry = match self.cache.lookup(content_hash).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(content_hash, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        let recipes = match decode(&entry) {
            Ok(recipes) => recipes,
            Err(e) => {
                tracing::warn!(content_hash, error = %e, "Undecodable cache entry, treating as miss");
                return None;
            }
        };

        Some(ExtractionReport {
            content_hash: entry.content_hash,
            source_url: url.to_string(),
            is_recipe: !recipes.is_empty(),
            confidence: None,
            recipes,
            from_cache: true,
            metrics: None,
        })
    }
}

fn decode(entry: &CacheEntry) -> Result<Vec<Recipe>, CacheError> {
    if !entry.valid {
        return Ok(Vec::new());
    }
    entry.recipes()
}
