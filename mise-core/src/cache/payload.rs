//! Cache payload encoding.
//!
//! - no recipes: empty string
//! - one recipe: a single YAML document
//! - several: a JSON array of YAML document strings
//!
//! A YAML recipe document is always a mapping, so a leading `[` is enough to
//! tell the two forms apart.

use crate::error::CacheError;
use crate::recipe::Recipe;

pub fn encode_payload(recipes: &[Recipe]) -> Result<String, CacheError> {
    match recipes {
        [] => Ok(String::new()),
        [recipe] => to_yaml(recipe),
        many => {
            let documents = many.iter().map(to_yaml).collect::<Result<Vec<_>, _>>()?;
            serde_json::to_string(&documents).map_err(|e| CacheError::Serialization(e.to_string()))
        }
    }
}

pub fn decode_payload(payload: &str) -> Result<Vec<Recipe>, CacheError> {
    let trimmed = payload.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let documents: Vec<String> =
            serde_json::from_str(trimmed).map_err(|e| CacheError::Payload(e.to_string()))?;
        documents.iter().map(|doc| from_yaml(doc)).collect()
    } else {
        Ok(vec![from_yaml(trimmed)?])
    }
}

fn to_yaml(recipe: &Recipe) -> Result<String, CacheError> {
    serde_yaml::to_string(recipe).map_err(|e| CacheError::Serialization(e.to_string()))
}

fn from_yaml(document: &str) -> Result<Recipe, CacheError> {
    serde_yaml::from_str(document).map_err(|e| CacheError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Ingredient, RecipeData, RecipeMetadata};

    fn recipe(title: &str) -> Recipe {
        Recipe::from_data(RecipeData {
            metadata: RecipeMetadata {
                title: title.to_string(),
                ..Default::default()
            },
            ingredients: vec![Ingredient {
                name: "salt".to_string(),
                amount: Some("1".to_string()),
                unit: Some("pinch".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    #[test]
    fn test_single_recipe_is_one_yaml_document() {
        let payload = encode_payload(&[recipe("Toast")]).unwrap();
        assert!(!payload.starts_with('['));
        assert!(payload.contains("title: Toast"));
        assert_eq!(decode_payload(&payload).unwrap(), vec![recipe("Toast")]);
    }

    #[test]
    fn test_several_recipes_are_json_array_of_yaml() {
        let recipes = vec![recipe("Toast"), recipe("Jam")];
        let payload = encode_payload(&recipes).unwrap();

        let documents: Vec<String> = serde_json::from_str(&payload).unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents[1].contains("title: Jam"));
        assert_eq!(decode_payload(&payload).unwrap(), recipes);
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(encode_payload(&[]).unwrap(), "");
        assert!(decode_payload("").unwrap().is_empty());
        assert!(decode_payload("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_payload() {
        assert!(matches!(decode_payload("[not json"), Err(CacheError::Payload(_))));
        assert!(matches!(decode_payload("title: [unclosed"), Err(CacheError::Payload(_))));
    }
}
