//! Disk-based recipe cache: one JSON file per content hash.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use super::{CacheEntry, RecipeCache};
use crate::error::CacheError;
use crate::recipe::Recipe;

/// Cache of extraction results stored under a directory, sharded by the
/// first two characters of the content hash.
pub struct DiskRecipeCache {
    cache_dir: PathBuf,
}

/// Summary of what a [`DiskRecipeCache`] holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Entry files found, readable or not
    pub entries: usize,
    /// Recipes across all recipe entries
    pub recipes: usize,
    /// Entries recording a confirmed non-recipe
    pub non_recipes: usize,
}

impl DiskRecipeCache {
    /// Create a cache rooted at `cache_dir`. The directory is created on first store.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// `~/.mise/recipe-cache`, or a relative directory when there is no home.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".mise").join("recipe-cache"))
            .unwrap_or_else(|| PathBuf::from(".mise-recipe-cache"))
    }

    /// Get the cache directory path.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Format: {hash[0:2]}/{hash}.json
    fn entry_path(&self, content_hash: &str) -> Result<PathBuf, CacheError> {
        if content_hash.len() < 2
            || !content_hash.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CacheError::Unavailable(format!(
                "invalid content hash: {:?}",
                content_hash
            )));
        }
        Ok(self
            .cache_dir
            .join(&content_hash[..2])
            .join(format!("{}.json", content_hash)))
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Payload(e.to_string()))
    }

    /// Walk the cache directory and count entries. Unreadable files count
    /// toward `entries` only.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        if self.cache_dir.exists() {
            collect_stats(&self.cache_dir, &mut stats);
        }
        stats
    }

    /// Delete every cached entry. A missing directory is not an error.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

fn collect_stats(dir: &Path, stats: &mut CacheStats) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if path.is_dir() {
            collect_stats(&path, stats);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            stats.entries += 1;
            match DiskRecipeCache::read_entry(&path) {
                Ok(Some(entry)) if entry.is_recipe() => stats.recipes += entry.recipe_count,
                Ok(Some(_)) => stats.non_recipes += 1,
                _ => {}
            }
        }
    }
}

#[async_trait]
impl RecipeCache for DiskRecipeCache {
    async fn lookup(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(content_hash)?;
        Self::read_entry(&path)
    }

    async fn store(
        &self,
        content_hash: &str,
        source_url: &str,
        recipes: Option<&[Recipe]>,
    ) -> Result<CacheEntry, CacheError> {
        let path = self.entry_path(content_hash)?;
        // A corrupt previous entry is overwritten rather than blocking the store.
        let previous = Self::read_entry(&path).ok().flatten();
        let entry = CacheEntry::new(
            content_hash,
            source_url,
            recipes,
            previous.as_ref(),
            Utc::now(),
        )?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;

        tracing::debug!(
            content_hash,
            version = entry.version,
            recipe_count = entry.recipe_count,
            "Cached extraction result"
        );
        Ok(entry)
    }
}
