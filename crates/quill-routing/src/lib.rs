//! Review generation orchestration.
//!
//! Requests flow through the response cache, then the in-flight registry so
//! identical concurrent requests share one generation, then the provider
//! chain in priority order, and finally the local template engine.

/// Response cache and in-flight deduplication
pub mod cache;
/// Provider chain and availability
pub mod config_manager;
/// Routing error types
pub mod error;
/// Metrics, alerts and reports
pub mod metrics;
/// Fallback orchestration
pub mod orchestrator;
/// Composition root
pub mod service;
/// Key-value stores for persisted state
pub mod store;

pub use cache::{CacheLayer, CacheStats, Claim, InFlightGuard, InFlightWaiter, ResponseCache};
pub use config_manager::{ConfigManager, ProviderEntry};
pub use error::{Result, RoutingError};
pub use metrics::{AlertEvent, AlertKind, MetricEvent, MetricsManager, MetricsSnapshot};
pub use orchestrator::FallbackOrchestrator;
pub use service::Quill;
pub use store::{FileStore, InMemoryStore, KeyValueStore};
