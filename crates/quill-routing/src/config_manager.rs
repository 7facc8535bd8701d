//! Provider registry and availability tracking.
//!
//! Holds the loaded configuration together with one client per enabled
//! provider, ordered by priority. Availability is checked lazily on first use,
//! checked again on lookup once older than `availability_refresh_seconds`, and
//! can also be refreshed on a timer.

use futures::future::join_all;
use quill_core::{
    CacheConfig, IgnoreLock as _, MonitoringConfig, ProviderClient, ProviderConfig, QuillConfig,
};
use quill_providers::OpenAiCompatibleProvider;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// A provider client with its settings and chain position.
#[derive(Clone)]
pub struct ProviderEntry {
    /// Provider settings
    pub config: ProviderConfig,
    /// Client used to call the provider
    pub client: Arc<dyn ProviderClient>,
    /// Zero-based position in the fallback chain
    pub rank: usize,
}

impl ProviderEntry {
    /// Provider identifier.
    pub fn id(&self) -> &str {
        self.client.id()
    }
}

/// Immutable configuration plus the provider chain.
pub struct ConfigManager {
    /// Loaded configuration
    config: Arc<QuillConfig>,
    /// Enabled providers in priority order
    providers: Vec<ProviderEntry>,
    /// Last check time and result, `None` until the first check
    availability: Mutex<Option<(Instant, BTreeMap<String, bool>)>>,
}

impl ConfigManager {
    /// Builds HTTP clients for every enabled provider in the configuration.
    pub fn from_config(config: QuillConfig) -> Self {
        let clients = config
            .providers_by_priority()
            .iter()
            .map(|provider| {
                Arc::new(OpenAiCompatibleProvider::from_quill_config(provider, &config))
                    as Arc<dyn ProviderClient>
            })
            .collect();
        Self::new(config, clients)
    }

    /// Uses the given clients as the provider chain.
    ///
    /// Clients whose id matches a configured provider take its priority and
    /// enabled flag; unknown clients keep their position after configured
    /// ones.
    pub fn new(config: QuillConfig, clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        let mut providers: Vec<ProviderEntry> = clients
            .into_iter()
            .enumerate()
            .map(|(index, client)| {
                let provider_config = config
                    .providers
                    .iter()
                    .find(|provider| provider.id == client.id())
                    .cloned()
                    .unwrap_or_else(|| Self::synthesized_config(client.as_ref(), index));
                ProviderEntry {
                    config: provider_config,
                    client,
                    rank: 0,
                }
            })
            .filter(|entry| entry.config.enabled)
            .collect();

        providers.sort_by_key(|entry| entry.config.priority);
        for (rank, entry) in providers.iter_mut().enumerate() {
            entry.rank = rank;
        }

        info!(
            "Provider chain: [{}]",
            providers
                .iter()
                .map(ProviderEntry::id)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            config: Arc::new(config),
            providers,
            availability: Mutex::new(None),
        }
    }

    /// Settings for a client that has no configuration entry.
    fn synthesized_config(client: &dyn ProviderClient, index: usize) -> ProviderConfig {
        ProviderConfig {
            id: client.id().to_owned(),
            endpoint: String::new(),
            model_id: client.model_id().to_owned(),
            timeout_ms: 10_000,
            max_retries: 0,
            cost_per_1k_tokens: 0.0,
            priority: u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1000),
            enabled: true,
            temperature: 0.7,
            max_tokens: 300,
            api_key_env: None,
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    /// Enabled providers in priority order.
    pub fn providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    /// Whether provider calls go through the proxy.
    pub fn proxy_enabled(&self) -> bool {
        self.config.proxy.enabled
    }

    /// Cache policy.
    pub fn cache(&self) -> &CacheConfig {
        &self.config.cache
    }

    /// Alert thresholds and background intervals.
    pub fn monitoring(&self) -> &MonitoringConfig {
        &self.config.monitoring
    }

    /// Checks every provider and stores the result.
    pub async fn check_availability(&self) -> BTreeMap<String, bool> {
        let checks = self.providers.iter().map(|entry| async move {
            (entry.id().to_owned(), entry.client.is_available().await)
        });
        let availability: BTreeMap<String, bool> = join_all(checks).await.into_iter().collect();

        debug!("Provider availability: {availability:?}");
        *self.availability.lock_ignore_poison() = Some((Instant::now(), availability.clone()));
        availability
    }

    /// Last known availability, probing first if nothing is known yet or the
    /// last check is older than the refresh interval.
    pub async fn availability(&self) -> BTreeMap<String, bool> {
        let ttl = Duration::from_secs(self.config.monitoring.availability_refresh_seconds);
        let fresh = self
            .availability
            .lock_ignore_poison()
            .as_ref()
            .filter(|(checked_at, _)| checked_at.elapsed() < ttl)
            .map(|(_, availability)| availability.clone());
        match fresh {
            Some(availability) => availability,
            None => self.check_availability().await,
        }
    }

    /// Whether a provider is currently considered available.
    pub async fn is_available(&self, provider_id: &str) -> bool {
        self.availability()
            .await
            .get(provider_id)
            .copied()
            .unwrap_or(false)
    }

    /// Re-checks availability every `period` until the handle is aborted.
    pub fn spawn_availability_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            loop {
                ticker.tick().await;
                manager.check_availability().await;
            }
        })
    }
}
