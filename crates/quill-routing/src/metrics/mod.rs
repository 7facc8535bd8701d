//! Metrics collection, alerting and reporting for review generation.
//!
//! This module tracks request, provider and cache counters, keeps daily and
//! monthly cost ledgers, raises threshold alerts and persists its state
//! through a key-value store.

/// Metric and alert event types
pub mod events;
/// Metrics accounting and alerting
pub mod manager;
/// Report generation
pub mod reporter;
/// Serializable metrics state
pub mod snapshot;

pub use events::{AlertEvent, AlertKind, MetricEvent};
pub use manager::{METRICS_KEY, MetricsManager, VARIANT_KEY_PREFIX};
pub use reporter::MetricsReport;
pub use snapshot::{
    AlertState, AlertThresholds, CacheCounters, CostLedger, LatencyStats, MetricsSnapshot,
    ProviderStats, RequestCounters, day_key, month_key,
};
