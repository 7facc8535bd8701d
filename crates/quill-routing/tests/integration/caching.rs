//! Response cache behavior through the full pipeline.

use super::common::{quill_with, quill_with_config, test_config};
use quill_core::{GenerationRequest, Source, Voice};
use quill_providers::{MockOutcome, MockProvider};
use std::sync::Arc;

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let primary = MockProvider::new("openai").with_cost_per_1k_tokens(1.0);
    let quill = quill_with(vec![Arc::new(primary.clone())]);
    let request = GenerationRequest::new("Harbor View", 5).with_highlight("view");

    let first = quill.generate(&request).await;
    let second = quill.generate(&request).await;

    assert_eq!(primary.call_count(), 1);
    assert_eq!(first.source, Source::PRIMARY);
    assert_eq!(second.source, Source::Cache);
    assert_eq!(second.origin, Source::PRIMARY);
    assert!(second.cached);
    assert_eq!(second.text, first.text);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_ne!(second.request_id, first.request_id);
    assert!(second.cost_usd.abs() < f64::EPSILON);

    let snapshot = quill.metrics().snapshot();
    assert_eq!(snapshot.cache.hits, 1);
    assert_eq!(snapshot.cache.misses, 1);
}

#[tokio::test]
async fn test_equivalent_requests_share_an_entry() {
    let primary = MockProvider::new("openai");
    let quill = quill_with(vec![Arc::new(primary.clone())]);

    let first = GenerationRequest::new("Harbor View", 4).with_highlights(["Pool", "spa"]);
    let second = GenerationRequest::new("  Harbor View ", 4).with_highlights(["spa", "pool "]);

    quill.generate(&first).await;
    let result = quill.generate(&second).await;

    assert_eq!(primary.call_count(), 1);
    assert_eq!(result.source, Source::Cache);
}

#[tokio::test]
async fn test_distinct_voices_are_not_shared() {
    let primary = MockProvider::new("openai");
    let quill = quill_with(vec![Arc::new(primary.clone())]);

    let base = GenerationRequest::new("Harbor View", 4);
    quill.generate(&base.clone().with_voice(Voice::Concise)).await;
    quill.generate(&base.with_voice(Voice::Enthusiastic)).await;

    assert_eq!(primary.call_count(), 2);
}

#[tokio::test]
async fn test_cache_bounded_by_max_entries() {
    let primary = MockProvider::new("openai");
    let quill = quill_with(vec![Arc::new(primary.clone())]);

    for index in 0..150 {
        quill
            .generate(&GenerationRequest::new(format!("Hotel {index}"), 3))
            .await;
    }

    assert_eq!(primary.call_count(), 150);
    assert_eq!(quill.cache().len(), 100);
    let stats = quill.cache().stats();
    assert_eq!(stats.capacity, 100);
    assert_eq!(stats.evictions, 50);

    // The most recent entries survive.
    quill
        .generate(&GenerationRequest::new("Hotel 149", 3))
        .await;
    assert_eq!(primary.call_count(), 150);
}

#[tokio::test]
async fn test_disabled_cache_always_calls_provider() {
    let mut config = test_config();
    config.cache.enabled = false;
    let primary = MockProvider::new("openai");
    let quill = quill_with_config(config, vec![Arc::new(primary.clone())]);
    let request = GenerationRequest::new("Harbor View", 5);

    let first = quill.generate(&request).await;
    let second = quill.generate(&request).await;

    assert_eq!(primary.call_count(), 2);
    assert_eq!(first.source, Source::PRIMARY);
    assert_eq!(second.source, Source::PRIMARY);
    assert!(quill.cache().is_empty());
}

#[tokio::test]
async fn test_recovered_provider_called_after_template_answer() {
    let primary = MockProvider::new("openai").with_outcome(MockOutcome::NetworkError);
    let quill = quill_with(vec![Arc::new(primary.clone())]);
    let request = GenerationRequest::new("Harbor View", 2);

    let first = quill.generate(&request).await;
    assert_eq!(first.source, Source::Template);
    assert!(quill.cache().is_empty());

    let second = quill.generate(&request).await;
    assert_eq!(second.source, Source::PRIMARY);
    assert_eq!(primary.call_count(), 2);

    let third = quill.generate(&request).await;
    assert_eq!(third.source, Source::Cache);
    assert_eq!(third.origin, Source::PRIMARY);
    assert_eq!(primary.call_count(), 2);
}
