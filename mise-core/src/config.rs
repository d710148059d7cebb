//! Pipeline settings.
//!
//! A single immutable [`Settings`] value is built once (usually via
//! [`Settings::from_env`]) and handed to every component constructor behind an
//! `Arc`. Nothing in the algorithmic code reads the environment itself.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Default keywords used by the section scorer.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "ingredients",
    "instructions",
    "directions",
    "method",
    "preparation",
    "prep time",
    "cook time",
    "total time",
    "servings",
    "yield",
    "tablespoon",
    "teaspoon",
    "cup",
    "minutes",
    "preheat",
    "oven",
];

/// Default tracking query parameters. A trailing `*` marks a prefix.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_*", "gclid", "dclid", "gbraid", "wbraid", "fbclid", "msclkid", "yclid", "twclid",
    "igshid", "mc_cid", "mc_eid", "_ga", "_gl", "ref", "ref_src", "referrer", "spm",
];

/// Settings for the HTML reduction cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Master switch. When off, raw HTML goes to the model untouched.
    pub enabled: bool,
    pub structured_data: bool,
    pub section_based: bool,
    pub content_filter: bool,
    /// Minimum structured-data completeness score (0-100).
    pub min_completeness: u32,
    /// Minimum section score (0-100).
    pub min_section_confidence: u32,
    /// Minimum size in bytes of a cleaned payload for sections and filtering.
    pub min_output_size: usize,
    /// Text length (chars) above which a section earns its length bonus.
    pub section_text_threshold: usize,
    pub keywords: Vec<String>,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            structured_data: true,
            section_based: true,
            content_filter: true,
            min_completeness: 70,
            min_section_confidence: 50,
            min_output_size: 300,
            section_text_threshold: 300,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Settings for strategy escalation on uncertain "not a recipe" answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub enabled: bool,
    /// Confidence at or above which a negative answer triggers less cleaning.
    pub confidence_threshold: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Feedback retries after the first extraction. Zero skips validation.
    pub max_retries: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// All pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cascade: CascadeSettings,
    pub adaptive: AdaptiveSettings,
    pub validation: ValidationSettings,
    pub tracking_params: Vec<String>,
    /// Maximum number of memoized `url -> hash` pairs. Zero disables the memo.
    pub hash_memo_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cascade: CascadeSettings::default(),
            adaptive: AdaptiveSettings::default(),
            validation: ValidationSettings::default(),
            tracking_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            hash_memo_capacity: 10_000,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, starting from the defaults.
    ///
    /// Recognized variables:
    /// - `MISE_CLEANING_ENABLED`, `MISE_STRUCTURED_DATA_ENABLED`,
    ///   `MISE_SECTION_ENABLED`, `MISE_CONTENT_FILTER_ENABLED`
    /// - `MISE_MIN_COMPLETENESS`, `MISE_MIN_SECTION_CONFIDENCE`,
    ///   `MISE_MIN_OUTPUT_SIZE`, `MISE_SECTION_TEXT_THRESHOLD`
    /// - `MISE_SECTION_KEYWORDS` (comma-separated)
    /// - `MISE_TRACKING_PARAMS` (comma-separated, `*` suffix for prefixes)
    /// - `MISE_ADAPTIVE_ENABLED`, `MISE_ADAPTIVE_THRESHOLD`
    /// - `MISE_VALIDATION_MAX_RETRIES`
    /// - `MISE_HASH_MEMO_CAPACITY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let cascade = &mut settings.cascade;

        set_bool(&lookup, "MISE_CLEANING_ENABLED", &mut cascade.enabled)?;
        set_bool(
            &lookup,
            "MISE_STRUCTURED_DATA_ENABLED",
            &mut cascade.structured_data,
        )?;
        set_bool(&lookup, "MISE_SECTION_ENABLED", &mut cascade.section_based)?;
        set_bool(
            &lookup,
            "MISE_CONTENT_FILTER_ENABLED",
            &mut cascade.content_filter,
        )?;
        set_parsed(&lookup, "MISE_MIN_COMPLETENESS", &mut cascade.min_completeness)?;
        set_parsed(
            &lookup,
            "MISE_MIN_SECTION_CONFIDENCE",
            &mut cascade.min_section_confidence,
        )?;
        set_parsed(&lookup, "MISE_MIN_OUTPUT_SIZE", &mut cascade.min_output_size)?;
        set_parsed(
            &lookup,
            "MISE_SECTION_TEXT_THRESHOLD",
            &mut cascade.section_text_threshold,
        )?;
        if let Some(list) = lookup("MISE_SECTION_KEYWORDS") {
            cascade.keywords = split_list(&list);
        }

        if let Some(list) = lookup("MISE_TRACKING_PARAMS") {
            settings.tracking_params = split_list(&list);
        }

        set_bool(&lookup, "MISE_ADAPTIVE_ENABLED", &mut settings.adaptive.enabled)?;
        set_parsed(
            &lookup,
            "MISE_ADAPTIVE_THRESHOLD",
            &mut settings.adaptive.confidence_threshold,
        )?;
        set_parsed(
            &lookup,
            "MISE_VALIDATION_MAX_RETRIES",
            &mut settings.validation.max_retries,
        )?;
        set_parsed(
            &lookup,
            "MISE_HASH_MEMO_CAPACITY",
            &mut settings.hash_memo_capacity,
        )?;

        Ok(settings)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn set_bool<F>(lookup: &F, name: &str, target: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(name) {
        *target = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value,
                })
            }
        };
    }
    Ok(())
}

fn set_parsed<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: value.clone(),
            })?;
    }
    Ok(())
}
