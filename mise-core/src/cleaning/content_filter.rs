//! Conservative boilerplate removal.
//!
//! The document is re-serialized while skipping non-content elements, so the
//! parsed tree itself is never mutated.

use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("Invalid selector"));

/// Class tokens or ids that mark ads, social widgets, comments and sidebars.
static NOISE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(ads?|ads?[-_].*|.*[-_]ads?)$|advert|sponsor|promo|social|(^|[-_])(share|sharing)([-_]|$)|(^|[-_])cookies?([-_](banner|consent|notice|bar|popup)|$)|comment|sidebar|side-bar|newsletter|popup",
    )
    .expect("Invalid noise regex")
});

const REMOVED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "iframe", "frame", "frameset",
    "embed", "object", "template",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const STRIPPED_ATTRS: &[&str] = &["style", "class", "id"];

/// Tokens naming the recipe itself are never noise.
fn is_noise_token(token: &str) -> bool {
    !token.to_ascii_lowercase().contains("recipe") && NOISE_PATTERN.is_match(token)
}

fn is_noise(element: &Element) -> bool {
    element.classes().any(is_noise_token) || element.id().is_some_and(is_noise_token)
}

fn is_hidden(element: &Element) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    element.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

fn is_removed(element: &Element) -> bool {
    REMOVED_TAGS.contains(&element.name()) || is_hidden(element) || is_noise(element)
}

fn keeps_attr(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    !STRIPPED_ATTRS.contains(&name.as_str()) && !name.starts_with("on")
}

fn escape_into(text: &str, out: &mut String, in_attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_children(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, out, false),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef, out: &mut String) {
    let value = element.value();
    if is_removed(value) {
        return;
    }

    let name = value.name();
    out.push('<');
    out.push_str(name);
    for (attr, attr_value) in value.attrs() {
        if keeps_attr(attr) {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            escape_into(attr_value, out, true);
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Body markup with boilerplate elements and presentational attributes removed.
pub fn filter(document: &Html) -> String {
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    write_children(root, &mut out);

    // Collapse the blank runs left behind by removed blocks
    let mut collapsed = String::with_capacity(out.len());
    let mut blank_run = false;
    for line in out.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            if !blank_run && !collapsed.is_empty() {
                collapsed.push('\n');
            }
            blank_run = true;
        } else {
            collapsed.push_str(trimmed);
            collapsed.push('\n');
            blank_run = false;
        }
    }

    collapsed.trim().to_string()
}

/// Filtered markup when it is at least `min_output_size` bytes.
pub fn extract(document: &Html, min_output_size: usize) -> Option<String> {
    let filtered = filter(document);
    tracing::debug!(size = filtered.len(), min_output_size, "Content filter output");
    (filtered.len() >= min_output_size).then_some(filtered)
}
