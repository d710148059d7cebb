//! Recipe cache keyed by content hash.
//!
//! Both positive results and confirmed non-recipes are stored, so a page is
//! only ever sent to the model once.

mod disk;
mod memory;
mod payload;

pub use disk::{CacheStats, DiskRecipeCache};
pub use memory::MemoryRecipeCache;
pub use payload::{decode_payload, encode_payload};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::recipe::Recipe;

/// One cached extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub source_url: String,
    pub recipe_count: usize,
    /// Encoded recipes; see [`encode_payload`]
    pub payload: String,
    /// False for a confirmed non-recipe
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Bumped on every store for the same hash
    pub version: u32,
}

impl CacheEntry {
    /// Build the entry that replaces `previous` (if any) for this hash.
    pub fn new(
        content_hash: &str,
        source_url: &str,
        recipes: Option<&[Recipe]>,
        previous: Option<&CacheEntry>,
        now: DateTime<Utc>,
    ) -> Result<Self, CacheError> {
        let recipes = recipes.unwrap_or_default();
        let payload = encode_payload(recipes)?;

        Ok(Self {
            content_hash: content_hash.to_string(),
            source_url: source_url.to_string(),
            recipe_count: recipes.len(),
            payload,
            valid: !recipes.is_empty(),
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            last_updated_at: now,
            version: previous.map(|p| p.version + 1).unwrap_or(1),
        })
    }

    /// Decode the stored recipes.
    pub fn recipes(&self) -> Result<Vec<Recipe>, CacheError> {
        decode_payload(&self.payload)
    }

    /// True when the entry holds at least one recipe.
    pub fn is_recipe(&self) -> bool {
        self.valid && self.recipe_count > 0
    }
}

#[async_trait]
pub trait RecipeCache: Send + Sync {
    /// Fetch the entry for `content_hash`, if one was stored.
    async fn lookup(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace the entry for `content_hash`. `None` or an empty
    /// slice records a confirmed non-recipe.
    async fn store(
        &self,
        content_hash: &str,
        source_url: &str,
        recipes: Option<&[Recipe]>,
    ) -> Result<CacheEntry, CacheError>;
}
