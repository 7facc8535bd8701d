//! Provider chain ordering and the template fallback.

use super::common::{quill_with, quill_with_config, test_config};
use quill_core::{GenerationRequest, ProviderClient, ProviderConfig, Source, TripType};
use quill_providers::{BackoffPolicy, MockOutcome, MockProvider, OpenAiCompatibleProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> GenerationRequest {
    GenerationRequest::new("Seaside Inn", 4)
        .with_trip_type(TripType::Family)
        .with_highlights(["pool", "breakfast"])
}

#[tokio::test]
async fn test_healthy_primary_answers() {
    let primary = MockProvider::new("openai").with_response("Lovely pool, great breakfast.");
    let secondary = MockProvider::new("groq");
    let quill = quill_with(vec![Arc::new(primary.clone()), Arc::new(secondary.clone())]);

    let result = quill.generate(&request()).await;

    assert_eq!(result.source, Source::PRIMARY);
    assert_eq!(result.provider_id.as_deref(), Some("openai"));
    assert_eq!(result.text, "Lovely pool, great breakfast.");
    assert!(!result.cached);
    assert_eq!(primary.call_count(), 1);
    assert_eq!(secondary.call_count(), 0);
}

#[tokio::test]
async fn test_primary_timeout_falls_back_to_secondary() {
    let primary = MockProvider::new("openai").failing(MockOutcome::Timeout);
    let secondary = MockProvider::new("groq").with_response("Kids loved it.");
    let quill = quill_with(vec![Arc::new(primary.clone()), Arc::new(secondary.clone())]);

    let result = quill.generate(&request()).await;

    assert_eq!(result.source, Source::SECONDARY);
    assert_eq!(result.provider_id.as_deref(), Some("groq"));
    assert_eq!(result.text, "Kids loved it.");
    assert_eq!(primary.call_count(), 1);

    let snapshot = quill.metrics().snapshot();
    assert_eq!(snapshot.providers["openai"].errors, 1);
    assert_eq!(snapshot.providers["groq"].successes, 1);
}

#[tokio::test]
async fn test_slow_http_primary_falls_back_within_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Too late." } }]
                })),
        )
        .mount(&server)
        .await;

    let primary_config = ProviderConfig {
        endpoint: format!("{}/v1/chat/completions", server.uri()),
        timeout_ms: 50,
        max_retries: 0,
        ..ProviderConfig::openai()
    };
    let primary = OpenAiCompatibleProvider::new(primary_config, Some("sk-test".to_owned()))
        .with_backoff(BackoffPolicy::none());
    let secondary = MockProvider::new("groq").with_response("Quick and friendly.");
    let quill = quill_with(vec![Arc::new(primary), Arc::new(secondary)]);

    let result = quill.generate(&request()).await;

    assert_eq!(result.source, Source::SECONDARY);
    assert_eq!(result.text, "Quick and friendly.");
    assert!(
        result.latency_ms < 500,
        "fallback took {}ms, primary timeout was not enforced",
        result.latency_ms
    );
}

#[tokio::test]
async fn test_exhausted_chain_uses_template() {
    let primary = MockProvider::new("openai").failing(MockOutcome::Status(503));
    let secondary = MockProvider::new("groq").failing(MockOutcome::NetworkError);
    let quill = quill_with(vec![Arc::new(primary), Arc::new(secondary)]);

    let result = quill.generate(&request()).await;

    assert_eq!(result.source, Source::Template);
    assert!(result.provider_id.is_none());
    assert!(result.text.contains("Seaside Inn"));
    assert!(result.cost_usd.abs() < f64::EPSILON);

    let snapshot = quill.metrics().snapshot();
    assert_eq!(snapshot.template_fallbacks, 1);
    assert_eq!(snapshot.requests.error, 2);
    assert_eq!(snapshot.requests.success, 0);
}

#[tokio::test]
async fn test_no_providers_configured_uses_template() {
    let mut config = test_config();
    for provider in &mut config.providers {
        provider.enabled = false;
    }
    let quill = quill_with_config(config, Vec::new());

    let result = quill.generate(&request()).await;

    assert_eq!(result.source, Source::Template);
    assert!(!result.text.is_empty());
}

#[tokio::test]
async fn test_every_outcome_combination_yields_text() {
    let outcomes = [
        Some(MockOutcome::Text("Remote review.".to_owned())),
        Some(MockOutcome::Timeout),
        Some(MockOutcome::NetworkError),
        Some(MockOutcome::Status(500)),
        None,
    ];

    for (index, primary_outcome) in outcomes.iter().enumerate() {
        for secondary_outcome in &outcomes {
            let primary = mock_with("openai", primary_outcome.as_ref());
            let secondary = mock_with("groq", secondary_outcome.as_ref());
            let providers: Vec<Arc<dyn ProviderClient>> =
                vec![Arc::new(primary), Arc::new(secondary)];
            let quill = quill_with(providers);

            let hotel = format!("Combination Hotel {index}");
            let result = quill.generate(&GenerationRequest::new(&hotel, 3)).await;

            assert!(!result.text.trim().is_empty());
            let expected = match (primary_outcome, secondary_outcome) {
                (Some(MockOutcome::Text(_)), _) => Source::PRIMARY,
                (_, Some(MockOutcome::Text(_))) => Source::SECONDARY,
                _ => Source::Template,
            };
            assert_eq!(
                result.source, expected,
                "primary {primary_outcome:?}, secondary {secondary_outcome:?}"
            );
        }
    }
}

/// Mock that always plays `outcome`, or is unavailable when `None`.
fn mock_with(id: &str, outcome: Option<&MockOutcome>) -> MockProvider {
    let provider = MockProvider::new(id);
    match outcome {
        Some(outcome) => provider.with_fallback(outcome.clone()),
        None => {
            provider.set_available(false);
            provider
        }
    }
}
