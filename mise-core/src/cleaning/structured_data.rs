//! Embedded schema.org Recipe metadata (JSON-LD and microdata).

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Regex to find JSON-LD script tags (case-insensitive for type attribute)
static JSONLD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("Invalid JSON-LD regex")
});

static MICRODATA_RECIPE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"[itemtype="http://schema.org/Recipe"], [itemtype="https://schema.org/Recipe"]"#,
    )
    .expect("Invalid selector")
});

/// Nesting limit when walking JSON-LD graphs.
pub const MAX_DEPTH: usize = 16;

const REQUIRED_WEIGHT: u32 = 25;
const TIMING_WEIGHT: u32 = 7;
const OPTIONAL_WEIGHT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    JsonLd,
    Microdata,
}

/// A recipe-shaped object found in the page.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredCandidate {
    pub source: CandidateSource,
    /// JSON text for JSON-LD, outer markup for microdata
    pub payload: String,
    /// Completeness, 0-100
    pub score: u32,
}

/// Return the most complete candidate if it reaches `min_completeness`.
pub fn extract(html: &str, min_completeness: u32) -> Option<String> {
    let best = collect_candidates(html)
        .into_iter()
        .fold(None::<StructuredCandidate>, |best, candidate| match best {
            Some(b) if b.score >= candidate.score => Some(b),
            _ => Some(candidate),
        })?;

    tracing::debug!(
        score = best.score,
        source = ?best.source,
        min_completeness,
        "Best structured data candidate"
    );

    (best.score >= min_completeness).then_some(best.payload)
}

/// Every recipe candidate in document order, JSON-LD first.
pub fn collect_candidates(html: &str) -> Vec<StructuredCandidate> {
    let mut candidates = Vec::new();

    for cap in JSONLD_REGEX.captures_iter(html) {
        let Some(json_text) = cap.get(1) else {
            continue;
        };

        let sanitized = sanitize_json(json_text.as_str());
        let json: Value = match serde_json::from_str(&sanitized) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparsable JSON-LD block");
                continue;
            }
        };

        let mut recipes = Vec::new();
        collect_recipes(&json, 0, &mut recipes);
        for recipe in recipes {
            if let Ok(payload) = serde_json::to_string(recipe) {
                candidates.push(StructuredCandidate {
                    source: CandidateSource::JsonLd,
                    score: completeness_score(recipe),
                    payload,
                });
            }
        }
    }

    // Only pay for a DOM parse when microdata is plausibly present
    if html.contains("itemtype") {
        let document = Html::parse_document(html);
        for element in document.select(&MICRODATA_RECIPE) {
            candidates.push(StructuredCandidate {
                source: CandidateSource::Microdata,
                score: microdata_score(&element),
                payload: element.html(),
            });
        }
    }

    candidates
}

/// Sanitize JSON-LD content to handle common malformed patterns.
/// Some sites include literal newlines/tabs inside JSON strings instead of escaped versions.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                result.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    result.push(c);
                }
                '"' => {
                    in_string = false;
                    result.push(c);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if c.is_control() => {}
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }

    result
}

fn is_recipe_type(value: &Value) -> bool {
    let matches = |s: &str| s == "Recipe" || s.ends_with("/Recipe") || s.ends_with(":Recipe");
    match value {
        Value::String(s) => matches(s),
        Value::Array(arr) => arr.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// Collect Recipe objects, flattening `@graph` wrappers and nested values.
/// Recipes are leaves: their own children are not searched.
fn collect_recipes<'a>(json: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_DEPTH {
        return;
    }

    match json {
        Value::Object(obj) => {
            if obj.get("@type").is_some_and(is_recipe_type) {
                out.push(json);
                return;
            }
            for value in obj.values() {
                collect_recipes(value, depth + 1, out);
            }
        }
        Value::Array(arr) => {
            for item in arr {
                collect_recipes(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(arr)) => !arr.is_empty(),
        Some(Value::Object(obj)) => !obj.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// Weighted presence of recipe fields, capped at 100.
pub fn completeness_score(recipe: &Value) -> u32 {
    let field = |name: &str| has_value(recipe.get(name));
    let mut score = 0;

    if field("name") {
        score += REQUIRED_WEIGHT;
    }
    if field("recipeIngredient") || field("ingredients") {
        score += REQUIRED_WEIGHT;
    }
    if field("recipeInstructions") {
        score += REQUIRED_WEIGHT;
    }
    if field("totalTime") || field("cookTime") || field("prepTime") {
        score += TIMING_WEIGHT;
    }
    if field("recipeYield") {
        score += OPTIONAL_WEIGHT;
    }
    if field("description") {
        score += OPTIONAL_WEIGHT;
    }
    if field("image") {
        score += OPTIONAL_WEIGHT;
    }

    score.min(100)
}

fn has_itemprop(element: &ElementRef, props: &[&str]) -> bool {
    let selector = props
        .iter()
        .map(|p| format!(r#"[itemprop="{}"]"#, p))
        .collect::<Vec<_>>()
        .join(", ");
    let Ok(selector) = Selector::parse(&selector) else {
        return false;
    };
    element.select(&selector).any(|el| {
        el.value()
            .attr("content")
            .map(|c| !c.trim().is_empty())
            .unwrap_or_else(|| {
                el.value().attr("src").is_some()
                    || !el.text().collect::<String>().trim().is_empty()
            })
    })
}

fn microdata_score(element: &ElementRef) -> u32 {
    let mut score = 0;

    if has_itemprop(element, &["name"]) {
        score += REQUIRED_WEIGHT;
    }
    if has_itemprop(element, &["recipeIngredient", "ingredients"]) {
        score += REQUIRED_WEIGHT;
    }
    if has_itemprop(element, &["recipeInstructions", "instructions"]) {
        score += REQUIRED_WEIGHT;
    }
    if has_itemprop(element, &["totalTime", "cookTime", "prepTime"]) {
        score += TIMING_WEIGHT;
    }
    if has_itemprop(element, &["recipeYield"]) {
        score += OPTIONAL_WEIGHT;
    }
    if has_itemprop(element, &["description"]) {
        score += OPTIONAL_WEIGHT;
    }
    if has_itemprop(element, &["image"]) {
        score += OPTIONAL_WEIGHT;
    }

    score.min(100)
}
