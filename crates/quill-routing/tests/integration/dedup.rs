//! Concurrent identical requests share one upstream call.

use super::common::quill_with;
use futures::future::join_all;
use quill_core::{GenerationRequest, Source};
use quill_providers::{MockOutcome, MockProvider};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_identical_requests_call_once() {
    let primary = MockProvider::new("openai").with_delay(Duration::from_millis(50));
    let quill = quill_with(vec![Arc::new(primary.clone())]);
    let request = GenerationRequest::new("Alpine Lodge", 5).with_highlight("sauna");

    let results = join_all((0..10).map(|_| quill.generate(&request))).await;

    assert_eq!(primary.call_count(), 1);
    assert_eq!(results.len(), 10);
    for result in &results {
        assert_eq!(result.text, results[0].text);
        assert_eq!(result.fingerprint, results[0].fingerprint);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dedup_across_worker_threads() {
    let primary = MockProvider::new("openai").with_delay(Duration::from_millis(100));
    let quill = quill_with(vec![Arc::new(primary.clone())]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let quill = quill.clone();
            tokio::spawn(async move {
                quill
                    .generate(&GenerationRequest::new("Alpine Lodge", 4))
                    .await
            })
        })
        .collect();

    let mut texts = Vec::new();
    for handle in handles {
        texts.push(handle.await.expect("task should not panic").text);
    }

    assert_eq!(primary.call_count(), 1);
    assert!(texts.iter().all(|text| *text == texts[0]));
}

#[tokio::test]
async fn test_distinct_requests_are_not_merged() {
    let primary = MockProvider::new("openai").with_delay(Duration::from_millis(20));
    let quill = quill_with(vec![Arc::new(primary.clone())]);
    let requests: Vec<_> = (1..=5)
        .map(|rating| GenerationRequest::new("Alpine Lodge", rating))
        .collect();

    join_all(requests.iter().map(|request| quill.generate(request))).await;

    assert_eq!(primary.call_count(), 5);
}

#[tokio::test]
async fn test_waiters_share_fallback_result() {
    let primary = MockProvider::new("openai")
        .with_delay(Duration::from_millis(30))
        .failing(MockOutcome::Timeout);
    let quill = quill_with(vec![Arc::new(primary.clone())]);
    let request = GenerationRequest::new("Alpine Lodge", 1);

    let results = join_all((0..4).map(|_| quill.generate(&request))).await;

    assert_eq!(primary.call_count(), 1);
    assert!(results.iter().all(|result| result.origin == Source::Template));
    assert_eq!(quill.metrics().snapshot().template_fallbacks, 1);
    assert!(quill.cache().is_empty());
}
