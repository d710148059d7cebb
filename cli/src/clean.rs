use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mise_core::{CleaningCascade, CleaningStrategy, ContentHasher, Settings, UrlNormalizer};

pub fn normalize(url: &str) -> Result<()> {
    let settings = Settings::from_env()?;
    let hasher = ContentHasher::new(
        UrlNormalizer::new(settings.tracking_params.as_slice()),
        settings.hash_memo_capacity,
    );

    println!("{}", hasher.normalizer().normalize(url)?);
    println!("{}", hasher.hash(url)?);
    Ok(())
}

/// Reduce an HTML file. Sizes and the chosen strategy go to stderr.
pub fn clean(file: &Path, strategy: Option<CleaningStrategy>, output: Option<&Path>) -> Result<()> {
    let html = fs::read_to_string(file)
        .with_context(|| format!("Failed to read HTML file: {}", file.display()))?;

    let cascade = CleaningCascade::new(Arc::new(Settings::from_env()?));
    let result = match strategy {
        Some(strategy) => cascade.apply_one(&html, strategy),
        None => cascade.reduce(&html),
    };

    eprintln!(
        "{}: {} -> {} bytes ({:.1}% removed)",
        result.strategy_used,
        result.original_size,
        result.cleaned_size,
        result.reduction_ratio * 100.0
    );

    match output {
        Some(path) => fs::write(path, &result.cleaned_html)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", result.cleaned_html),
    }
    Ok(())
}
