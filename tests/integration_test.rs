//! Live integration checks against the real Gemini API and thumbnail host.
//!
//! These need GEMINI_API_KEY (and network access) and are ignored by
//! default. Run with: cargo test --test integration_test -- --ignored

use scriptforge::config::AppConfig;
use scriptforge::services::gemini::GeminiClient;
use scriptforge::services::normalize;
use scriptforge::services::thumbnail::ThumbnailFetcher;
use scriptforge::services::upstream::UpstreamClient;
use serde_json::json;

fn live_client() -> GeminiClient {
    let config = AppConfig::from_env().expect("Failed to load config");
    GeminiClient::new(
        &config.gemini_api_key,
        &config.gemini_model,
        &config.gemini_image_model,
    )
    .expect("Failed to build Gemini client")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_live_key_check_and_text_generation() {
    let client = live_client();

    // 1. Key probe
    assert!(client.check_key().await, "configured key rejected");

    // 2. Plain text generation
    let text = client
        .generate_text("Reply with the single word: pong")
        .await
        .expect("text generation failed");
    assert!(!text.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_live_structured_generation_normalizes() {
    let client = live_client();

    let raw = client
        .generate_structured(
            "Return a JSON array of exactly two short strings naming primary colors.",
            json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
        )
        .await
        .expect("structured generation failed");

    let outline = normalize::outline(&raw).expect("model JSON did not normalize");
    assert_eq!(outline.len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_live_thumbnail_fetch() {
    let fetcher = ThumbnailFetcher::new().expect("fetcher");
    let bytes = fetcher
        .for_video("dQw4w9WgXcQ")
        .await
        .expect("thumbnail fetch failed");
    assert!(image::guess_format(&bytes).is_ok());
}
