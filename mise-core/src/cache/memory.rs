use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CacheEntry, RecipeCache};
use crate::error::CacheError;
use crate::recipe::Recipe;

/// Process-local cache. Entries live as long as the cache does.
#[derive(Debug, Default)]
pub struct MemoryRecipeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryRecipeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached hashes.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RecipeCache for MemoryRecipeCache {
    async fn lookup(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().await.get(content_hash).cloned())
    }

    async fn store(
        &self,
        content_hash: &str,
        source_url: &str,
        recipes: Option<&[Recipe]>,
    ) -> Result<CacheEntry, CacheError> {
        let mut entries = self.entries.write().await;
        let entry = CacheEntry::new(
            content_hash,
            source_url,
            recipes,
            entries.get(content_hash),
            Utc::now(),
        )?;
        entries.insert(content_hash.to_string(), entry.clone());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = MemoryRecipeCache::new();
        assert!(cache.lookup("h1").await.unwrap().is_none());

        cache.store("h1", "https://example.com/", None).await.unwrap();
        let updated = cache
            .store("h1", "https://example.com/", Some(&[Recipe::default()]))
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        let found = cache.lookup("h1").await.unwrap().unwrap();
        assert_eq!(found, updated);
        assert_eq!(cache.len().await, 1);
    }
}
