//! End-to-end pipeline tests over HTML fixtures in `tests/fixtures/`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mise_core::ai::FakeAiClient;
use mise_core::recipe::{Ingredient, Instruction, RecipeMetadata};
use mise_core::{
    CleaningCascade, CleaningStrategy, DiskRecipeCache, ExtractionEnvelope, LlmRecipeExtractor,
    MemoryRecipeCache, Recipe, RecipeData, RecipeExtractionService, ScriptedExtractor, Settings,
    ValidationRetryLoop,
};
use proptest::prelude::*;
use tempfile::TempDir;

const SNIPPET: &str = "<p>Just a short note about dinner!!!</p>";

const SOUP_RESPONSE: &str = r#"{
    "is_recipe": true,
    "recipe_confidence": 0.97,
    "internal_reasoning": "JSON-LD recipe with ingredients and steps",
    "recipes": [{
        "metadata": {"title": "Roasted Squash Soup", "servings": 4},
        "ingredients": [
            {"name": "butternut squash", "amount": 1},
            {"name": "vegetable stock", "amount": "1", "unit": "litre"}
        ],
        "instructions": [
            {"step": 1, "description": "Preheat the oven to 200C."},
            {"step": 2, "description": "Roast the squash."},
            {"step": 3, "description": "Blend with the stock."}
        ]
    }]
}"#;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

fn recipe(title: &str) -> Recipe {
    Recipe::from_data(RecipeData {
        metadata: RecipeMetadata {
            title: title.to_string(),
            ..Default::default()
        },
        ingredients: vec![Ingredient {
            name: "cornmeal".to_string(),
            ..Default::default()
        }],
        instructions: vec![Instruction {
            step: 1,
            description: "Bake.".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn invalid_recipe() -> Recipe {
    Recipe::from_data(RecipeData::default())
}

fn memory_service(extractor: &Arc<ScriptedExtractor>) -> RecipeExtractionService {
    RecipeExtractionService::new(
        Arc::new(Settings::default()),
        extractor.clone(),
        Arc::new(MemoryRecipeCache::new()),
    )
}

#[tokio::test]
async fn test_structured_data_page_end_to_end() {
    let html = fixture("jsonld_recipe.html");
    let client = Arc::new(FakeAiClient::with_response("Roasted Squash Soup", SOUP_RESPONSE));
    let service = RecipeExtractionService::new(
        Arc::new(Settings::default()),
        Arc::new(LlmRecipeExtractor::new(client.clone())),
        Arc::new(MemoryRecipeCache::new()),
    );

    let report = service
        .extract("https://weeknight.example/squash-soup?utm_source=pinterest", &html)
        .await
        .unwrap();

    assert!(report.is_recipe);
    assert!(!report.from_cache);
    assert_eq!(report.confidence, Some(0.97));
    let metrics = report.metrics.unwrap();
    assert_eq!(metrics.initial_strategy, CleaningStrategy::StructuredData);
    assert_eq!(metrics.final_strategy, CleaningStrategy::StructuredData);
    assert!(metrics.reduction_ratio > 0.8, "ratio was {}", metrics.reduction_ratio);

    let soup = &report.recipes[0];
    assert_eq!(soup.metadata.title, "Roasted Squash Soup");
    assert_eq!(soup.metadata.servings.as_deref(), Some("4"));
    assert_eq!(
        soup.metadata.source.as_deref(),
        Some("https://weeknight.example/squash-soup?utm_source=pinterest")
    );

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("recipeIngredient"));
    assert!(!prompt.contains("dataLayer"));
}

#[test]
fn test_section_page_is_reduced_to_the_recipe_card() {
    let html = fixture("section_recipe.html");
    let result = CleaningCascade::new(Arc::new(Settings::default())).reduce(&html);

    assert_eq!(result.strategy_used, CleaningStrategy::SectionBased);
    assert!(result.cleaned_html.contains("Skillet Cornbread"));
    assert!(result.cleaned_html.contains("buttermilk"));
    assert!(!result.cleaned_html.contains("Popular this week"));
    assert!(!result.cleaned_html.contains("Reader 3"));
    assert!(result.reduction_ratio > 0.5);
}

#[test]
fn test_tiny_snippet_falls_back_to_raw() {
    let result = CleaningCascade::new(Arc::new(Settings::default())).reduce(SNIPPET);

    assert_eq!(result.strategy_used, CleaningStrategy::Fallback);
    assert_eq!(result.cleaned_html, SNIPPET);
    assert_eq!(result.reduction_ratio, 0.0);
}

#[tokio::test]
async fn test_uncertain_answer_escalates_once_then_reevaluates() {
    let html = fixture("section_recipe.html");
    let extractor = Arc::new(ScriptedExtractor::new([
        ExtractionEnvelope::not_recipe(0.7),
        ExtractionEnvelope::new(true, 0.9, vec![recipe("Skillet Cornbread")]),
    ]));

    let report = memory_service(&extractor)
        .extract("https://weeknight.example/cornbread", &html)
        .await
        .unwrap();

    assert!(report.is_recipe);
    let metrics = report.metrics.unwrap();
    assert_eq!(metrics.initial_strategy, CleaningStrategy::SectionBased);
    assert_eq!(metrics.final_strategy, CleaningStrategy::ContentFilter);
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::SectionBased), Some(&1));
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::ContentFilter), Some(&1));
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::Fallback), None);
    assert_eq!(extractor.call_count(), 2);

    let payloads = extractor.payloads();
    assert_ne!(payloads[0], payloads[1]);
    assert!(!payloads[1].contains("dataLayer"));
}

#[tokio::test]
async fn test_uncertain_structured_answer_escalates_to_section() {
    let html = fixture("jsonld_section_recipe.html");
    let extractor = Arc::new(ScriptedExtractor::new([
        ExtractionEnvelope::not_recipe(0.7),
        ExtractionEnvelope::new(true, 0.9, vec![recipe("Skillet Cornbread")]),
    ]));

    let report = memory_service(&extractor)
        .extract("https://weeknight.example/cornbread-skillet", &html)
        .await
        .unwrap();

    assert!(report.is_recipe);
    let metrics = report.metrics.unwrap();
    assert_eq!(metrics.initial_strategy, CleaningStrategy::StructuredData);
    assert_eq!(metrics.final_strategy, CleaningStrategy::SectionBased);
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::StructuredData), Some(&1));
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::SectionBased), Some(&1));
    assert_eq!(metrics.strategy_attempts.get(&CleaningStrategy::ContentFilter), None);
    assert_eq!(extractor.call_count(), 2);

    let payloads = extractor.payloads();
    assert!(payloads[0].contains("recipeIngredient"));
    assert!(payloads[1].contains("<h2>Ingredients</h2>"));
    assert!(!payloads[1].contains("Popular this week"));
}

#[tokio::test]
async fn test_extractor_outage_is_retried_on_next_request() {
    let html = fixture("jsonld_recipe.html");
    let extractor = Arc::new(ScriptedExtractor::default());
    let service = memory_service(&extractor);

    let first = service
        .extract("https://weeknight.example/squash-soup", &html)
        .await
        .unwrap();
    assert!(!first.is_recipe);

    extractor.push(ExtractionEnvelope::new(true, 0.9, vec![recipe("Roasted Squash Soup")]));
    let second = service
        .extract("https://weeknight.example/squash-soup", &html)
        .await
        .unwrap();

    assert!(!second.from_cache);
    assert!(second.is_recipe);
}

#[tokio::test]
async fn test_null_fields_from_the_model_keep_the_recipe() {
    let response = r#"{
        "is_recipe": true,
        "recipe_confidence": 0.9,
        "internal_reasoning": null,
        "recipes": [{
            "metadata": {"title": "Roasted Squash Soup", "keywords": null, "servings": null},
            "ingredients": [{"name": "squash", "optional": null, "substitutions": null}],
            "equipment": null,
            "instructions": [{"step": 1, "description": "Roast.", "media": null, "temperature": null}],
            "nutrition": null
        }]
    }"#;
    let client = Arc::new(FakeAiClient::new().with_default_response(response));
    let service = RecipeExtractionService::new(
        Arc::new(Settings::default()),
        Arc::new(LlmRecipeExtractor::new(client.clone())),
        Arc::new(MemoryRecipeCache::new()),
    );

    let report = service
        .extract("https://weeknight.example/squash-soup", &fixture("jsonld_recipe.html"))
        .await
        .unwrap();

    assert!(report.is_recipe);
    assert_eq!(report.recipes[0].metadata.title, "Roasted Squash Soup");
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_confident_non_recipe_stops_without_escalating() {
    let html = fixture("section_recipe.html");
    let extractor = Arc::new(ScriptedExtractor::new([ExtractionEnvelope::not_recipe(0.2)]));

    let report = memory_service(&extractor)
        .extract("https://weeknight.example/cornbread", &html)
        .await
        .unwrap();

    assert!(!report.is_recipe);
    assert_eq!(report.confidence, Some(0.2));
    assert_eq!(extractor.call_count(), 1);
}

#[tokio::test]
async fn test_second_request_is_served_from_disk_cache() {
    let temp_dir = TempDir::new().unwrap();
    let html = fixture("jsonld_recipe.html");
    let client = Arc::new(FakeAiClient::new().with_default_response(SOUP_RESPONSE));
    let service = RecipeExtractionService::new(
        Arc::new(Settings::default()),
        Arc::new(LlmRecipeExtractor::new(client.clone())),
        Arc::new(DiskRecipeCache::new(temp_dir.path())),
    );

    let first = service
        .extract("https://weeknight.example/squash-soup#comments", &html)
        .await
        .unwrap();
    let second = service
        .extract("https://WEEKNIGHT.example/squash-soup?fbclid=abc", &html)
        .await
        .unwrap();

    assert_eq!(client.calls(), 1);
    assert!(second.from_cache);
    assert_eq!(second.confidence, None);
    assert_eq!(second.content_hash, first.content_hash);
    assert_eq!(second.recipes, first.recipes);
}

#[tokio::test]
async fn test_concurrent_requests_for_one_page_extract_once() {
    let html = fixture("jsonld_recipe.html");
    let client = Arc::new(FakeAiClient::new().with_default_response(SOUP_RESPONSE));
    let service = Arc::new(RecipeExtractionService::new(
        Arc::new(Settings::default()),
        Arc::new(LlmRecipeExtractor::new(client.clone())),
        Arc::new(MemoryRecipeCache::new()),
    ));

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            let html = html.clone();
            tokio::spawn(async move {
                service
                    .extract(&format!("https://weeknight.example/squash-soup?utm_campaign={i}"), &html)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut from_cache = 0;
    for task in tasks {
        if task.await.unwrap().from_cache {
            from_cache += 1;
        }
    }

    assert_eq!(client.calls(), 1);
    assert_eq!(from_cache, 3);
}

#[tokio::test]
async fn test_retry_bound_per_validation_run() {
    for max_retries in 0..4u32 {
        let envelopes = (0..10).map(|_| ExtractionEnvelope::new(true, 0.9, vec![invalid_recipe()]));
        let extractor = Arc::new(ScriptedExtractor::new(envelopes));
        let mut settings = Settings::default();
        settings.validation.max_retries = max_retries;

        let outcome = ValidationRetryLoop::new(Arc::new(settings), extractor.clone())
            .run("<p/>", "https://example.com/")
            .await;

        assert!(extractor.call_count() <= 1 + max_retries as usize);
        assert_eq!(outcome.extractor_calls as usize, extractor.call_count());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_partial_success_keeps_valid_subset(mask in prop::collection::vec(any::<bool>(), 1..8)) {
        let recipes: Vec<Recipe> = mask
            .iter()
            .enumerate()
            .map(|(i, valid)| if *valid { recipe(&format!("Recipe {i}")) } else { invalid_recipe() })
            .collect();
        let valid_count = mask.iter().filter(|v| **v).count();
        let extractor = Arc::new(ScriptedExtractor::new([ExtractionEnvelope::new(true, 0.8, recipes)]));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let outcome = runtime.block_on(
            ValidationRetryLoop::new(Arc::new(Settings::default()), extractor.clone())
                .run("<p/>", "https://example.com/"),
        );

        if valid_count > 0 {
            prop_assert!(outcome.is_recipe);
            prop_assert_eq!(outcome.recipes.len(), valid_count);
            prop_assert_eq!(extractor.call_count(), 1);
        } else {
            prop_assert!(!outcome.is_recipe);
            prop_assert!(outcome.recipes.is_empty());
        }
    }
}
