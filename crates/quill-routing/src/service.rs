//! Composition root wiring configuration, providers, cache and metrics.

use quill_core::{GenerationRequest, GenerationResult, ProviderClient, QuillConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheLayer;
use crate::config_manager::ConfigManager;
use crate::metrics::{AlertEvent, MetricsManager};
use crate::orchestrator::FallbackOrchestrator;
use crate::store::{FileStore, KeyValueStore};
use crate::{Result, RoutingError};

/// A fully assembled review generator.
///
/// Every component is built explicitly from the configuration and shared
/// through `Arc`s; nothing is global.
#[derive(Clone)]
pub struct Quill {
    /// Request pipeline
    orchestrator: FallbackOrchestrator,
}

impl Quill {
    /// Loads configuration from `config_path` (or the default location,
    /// creating it if missing) and opens the on-disk state store.
    ///
    /// # Errors
    /// Returns an error if the configuration or state store cannot be loaded.
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => QuillConfig::load_from_file(path)?,
            None => QuillConfig::load_or_create()?,
        };
        let state_path = config.state_path()?;
        let store = FileStore::open(&state_path)?;
        info!("Using state store {:?}", state_path);
        Ok(Self::from_config(config, Arc::new(store)))
    }

    /// Builds HTTP providers for every enabled provider in `config`.
    pub fn from_config(config: QuillConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let metrics = MetricsManager::restore(&config.monitoring, &config.experiments, store);
        let cache = CacheLayer::new(&config.cache);
        Self::assemble(ConfigManager::from_config(config), cache, metrics)
    }

    /// Uses the given provider clients instead of HTTP providers.
    pub fn with_providers(
        config: QuillConfig,
        providers: Vec<Arc<dyn ProviderClient>>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let metrics = MetricsManager::restore(&config.monitoring, &config.experiments, store);
        let cache = CacheLayer::new(&config.cache);
        Self::assemble(ConfigManager::new(config, providers), cache, metrics)
    }

    /// Shared wiring.
    fn assemble(config: ConfigManager, cache: CacheLayer, metrics: MetricsManager) -> Self {
        Self {
            orchestrator: FallbackOrchestrator::new(
                Arc::new(config),
                Arc::new(cache),
                Arc::new(metrics),
            ),
        }
    }

    /// Produces a review; never fails.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.orchestrator.generate(request).await
    }

    /// Formatted metrics report.
    pub fn metrics_summary(&self) -> String {
        self.orchestrator.metrics_summary()
    }

    /// Re-checks every provider.
    pub async fn check_availability(&self) -> BTreeMap<String, bool> {
        self.orchestrator.check_availability().await
    }

    /// Subscribes to threshold alerts.
    pub fn subscribe_alerts(&self) -> Receiver<AlertEvent> {
        self.orchestrator.metrics().subscribe()
    }

    /// A/B variant for a session.
    pub fn assign_variant(&self, session_id: &str) -> String {
        self.orchestrator.metrics().assign_variant(session_id)
    }

    /// Writes metrics to the state store.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be written.
    pub fn persist_metrics(&self) -> Result<()> {
        self.orchestrator
            .metrics()
            .persist()
            .map_err(RoutingError::from)
    }

    /// Starts availability refresh and periodic metrics persistence.
    ///
    /// The tasks run until their handles are aborted.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let monitoring = self.orchestrator.config().monitoring().clone();
        vec![
            self.orchestrator
                .config()
                .spawn_availability_refresh(Duration::from_secs(
                    monitoring.availability_refresh_seconds,
                )),
            self.orchestrator
                .metrics()
                .spawn_periodic_persist(Duration::from_secs(monitoring.persist_interval_seconds)),
        ]
    }

    /// Request pipeline.
    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    /// Provider chain and configuration.
    pub fn config(&self) -> &Arc<ConfigManager> {
        self.orchestrator.config()
    }

    /// Cache layer.
    pub fn cache(&self) -> &Arc<CacheLayer> {
        self.orchestrator.cache()
    }

    /// Metrics manager.
    pub fn metrics(&self) -> &Arc<MetricsManager> {
        self.orchestrator.metrics()
    }
}
