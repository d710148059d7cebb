pub mod ai;
pub mod cache;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod recipe;
pub mod service;
pub mod types;
pub mod url;
pub mod validation;

pub use cache::{CacheEntry, CacheStats, DiskRecipeCache, MemoryRecipeCache, RecipeCache};
pub use cleaning::CleaningCascade;
pub use config::{AdaptiveSettings, CascadeSettings, ConfigError, Settings, ValidationSettings};
pub use error::{CacheError, PipelineError};
pub use extractor::{parse_envelope, LlmRecipeExtractor, RecipeExtractor, ScriptedExtractor};
pub use orchestrator::{AdaptiveCleaningOrchestrator, OrchestratorOutcome, PipelineMetrics};
pub use recipe::{Ingredient, Instruction, Recipe, RecipeData, RecipeMetadata};
pub use service::{ExtractionReport, RecipeExtractionService};
pub use types::{
    CleaningStrategy, ExtractionEnvelope, PreprocessingResult, UnknownStrategy, ValidationOutcome,
};
pub use url::{ContentHasher, UrlNormalizer};
pub use validation::{validate_recipe, ExtractionOutcome, ValidationRetryLoop};
