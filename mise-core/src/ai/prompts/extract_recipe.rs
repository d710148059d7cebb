//! Recipe extraction prompts and the response schema sent with them.

use serde_json::{json, Value};

/// Prompt name, for logs.
pub const EXTRACT_RECIPE_PROMPT_NAME: &str = "extract_recipe";

/// JSON schema of the expected response envelope.
///
/// Recipe items deliberately carry no recipe flag of their own; the envelope's
/// `is_recipe` covers the whole page.
pub fn response_schema() -> Value {
    let nullable_string = json!({"type": ["string", "null"]});

    json!({
        "type": "object",
        "required": ["is_recipe", "recipe_confidence", "recipes"],
        "properties": {
            "is_recipe": {"type": "boolean"},
            "recipe_confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "internal_reasoning": {"type": "string"},
            "recipes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["metadata", "ingredients", "instructions"],
                    "properties": {
                        "metadata": {
                            "type": "object",
                            "required": ["title"],
                            "properties": {
                                "title": {"type": "string"},
                                "author": nullable_string,
                                "description": nullable_string,
                                "language": nullable_string,
                                "date_published": nullable_string,
                                "servings": nullable_string,
                                "prep_time": nullable_string,
                                "cook_time": nullable_string,
                                "total_time": nullable_string,
                                "difficulty": nullable_string,
                                "cover_image": nullable_string,
                                "cuisine": nullable_string,
                                "category": nullable_string,
                                "keywords": {"type": "array", "items": {"type": "string"}}
                            }
                        },
                        "ingredients": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name"],
                                "properties": {
                                    "name": {"type": "string"},
                                    "amount": nullable_string,
                                    "unit": nullable_string,
                                    "preparation": nullable_string,
                                    "optional": {"type": "boolean"},
                                    "group": nullable_string,
                                    "substitutions": {"type": "array", "items": {"type": "string"}}
                                }
                            }
                        },
                        "equipment": {"type": "array", "items": {"type": "string"}},
                        "instructions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["step", "description"],
                                "properties": {
                                    "step": {"type": "integer"},
                                    "description": {"type": "string"},
                                    "time": nullable_string,
                                    "temperature": {
                                        "type": ["object", "null"],
                                        "properties": {
                                            "value": nullable_string,
                                            "unit": nullable_string
                                        }
                                    },
                                    "media": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "type": {"type": "string", "enum": ["image", "video"]},
                                                "url": {"type": "string"}
                                            }
                                        }
                                    }
                                }
                            }
                        },
                        "nutrition": {"type": ["object", "null"]},
                        "notes": nullable_string
                    }
                }
            }
        }
    })
}

/// System prompt: role, rules and the response schema.
pub fn render_system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&response_schema()).unwrap_or_default();

    format!(
        r#"You extract cooking recipes from web page markup.

RULES:
- Respond with a single JSON object matching the schema below. No other text.
- Set "is_recipe" to true only if the page contains at least one complete recipe
  (a title, ingredients and preparation steps). Otherwise return an empty "recipes" array.
- "recipe_confidence" is your certainty (0 to 1) that the page contains a recipe.
  If the markup looks truncated or stripped but hints at a recipe, say so with a
  high confidence even when you cannot extract it.
- Extract every distinct recipe on the page, in page order.
- Copy quantities and wording from the page; do not invent ingredients or steps.
- Number instructions starting at 1.

JSON Schema:
{schema}"#
    )
}

/// User message for a first extraction attempt.
pub fn render_extract_prompt(cleaned_html: &str, source_url: &str) -> String {
    format!(
        "Source URL: {source_url}\n\nPage markup:\n{cleaned_html}",
        source_url = source_url,
        cleaned_html = cleaned_html
    )
}

/// User message for a retry after validation failed.
pub fn render_feedback_prompt(
    cleaned_html: &str,
    previous_recipe_json: &str,
    validation_error: &str,
) -> String {
    format!(
        r#"Your previous extraction from this page failed validation.

Previous recipe:
{previous_recipe_json}

Validation errors: {validation_error}

Fix these problems and extract again from the same markup. If the page does not
actually contain a complete recipe, answer with "is_recipe": false.

Page markup:
{cleaned_html}"#
    )
}
