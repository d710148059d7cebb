mod clean;
mod extract;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "mise")]
#[command(about = "Recipe extraction from HTML pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    StructuredData,
    SectionBased,
    ContentFilter,
    Fallback,
}

impl From<Strategy> for mise_core::CleaningStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::StructuredData => Self::StructuredData,
            Strategy::SectionBased => Self::SectionBased,
            Strategy::ContentFilter => Self::ContentFilter,
            Strategy::Fallback => Self::Fallback,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized form and content hash of a URL
    Normalize {
        url: String,
    },
    /// Reduce an HTML file and print the cleaned payload
    Clean {
        /// HTML file to clean
        file: PathBuf,
        /// Apply exactly one strategy instead of running the cascade
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        /// Write the cleaned HTML here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Extract recipes from an HTML file fetched from URL
    Extract {
        /// URL the page was fetched from
        #[arg(long)]
        url: String,
        /// HTML file to extract from
        #[arg(long)]
        html: PathBuf,
        /// Cache directory (default: ~/.mise/recipe-cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Keep results in memory only
        #[arg(long)]
        no_cache: bool,
        /// Answer every model request with the contents of this file
        #[arg(long)]
        canned_response: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Show recipe cache statistics
    CacheStats {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Delete all cached results
    CacheClear {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { url } => {
            clean::normalize(&url)?;
        }
        Commands::Clean {
            file,
            strategy,
            output,
        } => {
            clean::clean(&file, strategy.map(Into::into), output.as_deref())?;
        }
        Commands::Extract {
            url,
            html,
            cache_dir,
            no_cache,
            canned_response,
            format,
        } => {
            let cache = if no_cache {
                extract::CacheChoice::Memory
            } else {
                extract::CacheChoice::Disk(cache_dir.unwrap_or_else(mise_core::DiskRecipeCache::default_dir))
            };
            extract::extract(&url, &html, cache, canned_response.as_deref(), format).await?;
        }
        Commands::CacheStats { cache_dir } => {
            let cache = mise_core::DiskRecipeCache::new(
                cache_dir.unwrap_or_else(mise_core::DiskRecipeCache::default_dir),
            );
            let stats = cache.stats();
            println!("Cache directory: {}", cache.cache_dir().display());
            println!("Entries:         {}", stats.entries);
            println!("Recipes:         {}", stats.recipes);
            println!("Non-recipes:     {}", stats.non_recipes);
        }
        Commands::CacheClear { cache_dir } => {
            let cache = mise_core::DiskRecipeCache::new(
                cache_dir.unwrap_or_else(mise_core::DiskRecipeCache::default_dir),
            );
            cache.clear()?;
            println!("Cleared {}", cache.cache_dir().display());
        }
    }

    Ok(())
}
