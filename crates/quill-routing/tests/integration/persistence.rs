//! Metrics and A/B assignments survive a restart through the file store.

use super::common::{init_tracing, test_config};
use quill_core::{GenerationRequest, QuillConfig};
use quill_providers::MockProvider;
use quill_routing::{FileStore, Quill};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open(config: &QuillConfig, state: &Path) -> Quill {
    init_tracing();
    let store = FileStore::open(state).expect("state store should open");
    let primary = MockProvider::new("openai").with_cost_per_1k_tokens(1.0);
    Quill::with_providers(config.clone(), vec![Arc::new(primary)], Arc::new(store))
}

#[tokio::test]
async fn test_counters_restored_after_restart() {
    let dir = TempDir::new().expect("temp dir");
    let state = dir.path().join("state.json");
    let config = test_config();

    let before = {
        let quill = open(&config, &state);
        quill
            .generate(&GenerationRequest::new("Old Mill", 4))
            .await;
        quill
            .generate(&GenerationRequest::new("Old Mill", 4))
            .await;
        quill.persist_metrics().expect("persist");
        quill.metrics().snapshot()
    };

    let quill = open(&config, &state);
    let after = quill.metrics().snapshot();

    assert_eq!(after.requests, before.requests);
    assert_eq!(after.cache.hits, 1);
    assert!((after.costs.total_usd - before.costs.total_usd).abs() < 1e-12);
    assert!(quill.metrics_summary().contains("Requests"));
}

#[tokio::test]
async fn test_variant_assignment_is_sticky() {
    let dir = TempDir::new().expect("temp dir");
    let state = dir.path().join("state.json");
    let config = test_config();

    let first = open(&config, &state).assign_variant("session-42");

    let mut reordered = config;
    reordered.experiments.variants.reverse();
    let second = open(&reordered, &state).assign_variant("session-42");

    assert_eq!(first, second);
    assert!(["control", "treatment"].contains(&first.as_str()));
}
