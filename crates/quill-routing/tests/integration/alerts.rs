//! Threshold alerts raised through the pipeline.

use super::common::{quill_with_config, test_config};
use quill_core::GenerationRequest;
use quill_providers::{MockOutcome, MockProvider};
use quill_routing::{AlertEvent, AlertKind};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

/// Drains every alert delivered so far.
fn drain(receiver: &mut Receiver<AlertEvent>) -> Vec<AlertEvent> {
    let mut alerts = Vec::new();
    while let Ok(alert) = receiver.try_recv() {
        alerts.push(alert);
    }
    alerts
}

#[tokio::test]
async fn test_daily_cost_alert_fires_once() {
    let mut config = test_config();
    config.monitoring.daily_cost_threshold_usd = 0.05;
    let primary = MockProvider::new("openai").with_cost_per_1k_tokens(10.0);
    let quill = quill_with_config(config, vec![Arc::new(primary)]);
    let mut alerts = quill.subscribe_alerts();

    for index in 0..5 {
        quill
            .generate(&GenerationRequest::new(format!("Budget Hotel {index}"), 4))
            .await;
    }

    let cost_alerts: Vec<_> = drain(&mut alerts)
        .into_iter()
        .filter(|alert| alert.kind == AlertKind::Cost)
        .collect();
    assert_eq!(cost_alerts.len(), 1);
    assert!(cost_alerts[0].value > 0.05);
    assert!((cost_alerts[0].threshold - 0.05).abs() < f64::EPSILON);
    assert!(quill.metrics().snapshot().cost_today() > 0.05);
}

#[tokio::test]
async fn test_error_rate_alert_after_min_samples() {
    let mut config = test_config();
    config.monitoring.min_samples_for_error_rate = 4;
    config.monitoring.error_rate_threshold = 0.5;
    let primary = MockProvider::new("openai").failing(MockOutcome::Status(500));
    let quill = quill_with_config(config, vec![Arc::new(primary)]);
    let mut alerts = quill.subscribe_alerts();

    for index in 0..3 {
        quill
            .generate(&GenerationRequest::new(format!("Flaky Hotel {index}"), 3))
            .await;
    }
    assert!(drain(&mut alerts).is_empty());

    for index in 3..6 {
        quill
            .generate(&GenerationRequest::new(format!("Flaky Hotel {index}"), 3))
            .await;
    }
    let fired = drain(&mut alerts);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, AlertKind::ErrorRate);
}

#[tokio::test]
async fn test_cost_never_decreases() {
    let primary = MockProvider::new("openai")
        .with_cost_per_1k_tokens(2.0)
        .with_outcome(MockOutcome::Text("A fine stay all round.".to_owned()))
        .with_outcome(MockOutcome::NetworkError)
        .with_outcome(MockOutcome::Text("Would return next summer.".to_owned()));
    let quill = quill_with_config(test_config(), vec![Arc::new(primary)]);

    let mut last_total = 0.0;
    let mut last_today = 0.0;
    for index in 0..6 {
        // Requests come in pairs; the template answer is not cached.
        let hotel = format!("Ledger Hotel {}", index / 2);
        quill.generate(&GenerationRequest::new(hotel, 4)).await;

        let snapshot = quill.metrics().snapshot();
        assert!(snapshot.costs.total_usd >= last_total);
        assert!(snapshot.cost_today() >= last_today);
        last_total = snapshot.costs.total_usd;
        last_today = snapshot.cost_today();
    }
    assert!(last_total > 0.0);
}
