//! Keyword and structure scoring of candidate content containers.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::config::CascadeSettings;

static CANDIDATES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"article, section, main, [role="main"], [class*="recipe" i], [id*="recipe" i],
           #content, .content, #main, .main-content, .entry-content, .post-content"#,
    )
    .expect("Invalid selector")
});

static LISTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul, ol").expect("Invalid selector"));

static SUBHEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, h5, h6").expect("Invalid selector"));

const KEYWORD_POINTS: u32 = 10;
const LIST_POINTS: u32 = 20;
const HEADING_POINTS: u32 = 10;
const LENGTH_POINTS: u32 = 10;

/// Score a container: keywords, lists, subheadings and text length, capped at 100.
pub fn score_section(element: &ElementRef, keywords: &[String], text_threshold: usize) -> u32 {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let keyword_hits = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && text.contains(k.as_str()))
        .count() as u32;

    let mut score = keyword_hits * KEYWORD_POINTS;
    if element.select(&LISTS).count() >= 2 {
        score += LIST_POINTS;
    }
    if element.select(&SUBHEADINGS).count() >= 2 {
        score += HEADING_POINTS;
    }
    if text.chars().count() > text_threshold {
        score += LENGTH_POINTS;
    }

    score.min(100)
}

/// Highest scoring candidate as `(score, inner_html)`. Ties keep the first in document order.
pub fn best_section(document: &Html, settings: &CascadeSettings) -> Option<(u32, String)> {
    let mut best: Option<(u32, ElementRef)> = None;

    for element in document.select(&CANDIDATES) {
        let score = score_section(
            &element,
            &settings.keywords,
            settings.section_text_threshold,
        );
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, element));
        }
    }

    best.map(|(score, element)| (score, element.inner_html()))
}

/// Inner markup of the best section when it is confident and large enough.
pub fn extract(document: &Html, settings: &CascadeSettings) -> Option<String> {
    let (score, html) = best_section(document, settings)?;

    tracing::debug!(
        score,
        size = html.len(),
        min_confidence = settings.min_section_confidence,
        "Best section candidate"
    );

    (score >= settings.min_section_confidence && html.trim().len() >= settings.min_output_size)
        .then_some(html)
}
