use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use mise_core::ai::{AiClient, FakeAiClient, OpenRouterClient};
use mise_core::{
    DiskRecipeCache, LlmRecipeExtractor, MemoryRecipeCache, RecipeCache, RecipeExtractionService,
    Settings,
};

use crate::OutputFormat;

pub enum CacheChoice {
    Memory,
    Disk(PathBuf),
}

/// Extract recipes from an HTML file and print the report to stdout.
pub async fn extract(
    url: &str,
    html_file: &Path,
    cache: CacheChoice,
    canned_response: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let html = fs::read_to_string(html_file)
        .with_context(|| format!("Failed to read HTML file: {}", html_file.display()))?;

    let client: Arc<dyn AiClient> = match canned_response {
        Some(path) => {
            let response = fs::read_to_string(path)
                .with_context(|| format!("Failed to read response file: {}", path.display()))?;
            Arc::new(FakeAiClient::new().with_default_response(&response))
        }
        None => Arc::new(OpenRouterClient::from_env().context("Failed to configure AI client")?),
    };

    let cache: Arc<dyn RecipeCache> = match cache {
        CacheChoice::Memory => Arc::new(MemoryRecipeCache::new()),
        CacheChoice::Disk(dir) => Arc::new(DiskRecipeCache::new(dir)),
    };

    let service = RecipeExtractionService::new(
        Arc::new(Settings::from_env()?),
        Arc::new(LlmRecipeExtractor::new(client)),
        cache,
    );

    let report = service.extract(url, &html).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
    }

    if !report.is_recipe {
        tracing::info!(url, "No recipe found");
    }
    Ok(())
}
