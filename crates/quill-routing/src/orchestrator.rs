use quill_core::{Fingerprint, GenerationRequest, GenerationResult, Source};
use quill_template::TemplateEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheLayer, Claim};
use crate::config_manager::{ConfigManager, ProviderEntry};
use crate::metrics::{MetricEvent, MetricsManager};

/// Generates reviews through cache, providers and template, in that order.
///
/// `generate` never fails: when every provider is unavailable or exhausted,
/// the local template answers.
#[derive(Clone)]
pub struct FallbackOrchestrator {
    /// Provider chain and availability
    config: Arc<ConfigManager>,
    /// Response cache and in-flight registry
    cache: Arc<CacheLayer>,
    /// Counters and alerts
    metrics: Arc<MetricsManager>,
    /// Terminal fallback
    template: TemplateEngine,
}

impl FallbackOrchestrator {
    /// Creates an orchestrator over shared components.
    pub fn new(
        config: Arc<ConfigManager>,
        cache: Arc<CacheLayer>,
        metrics: Arc<MetricsManager>,
    ) -> Self {
        Self {
            config,
            cache,
            metrics,
            template: TemplateEngine::new(),
        }
    }

    /// Produces a review for the request.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let start = Instant::now();
        let fingerprint = Fingerprint::of(request);
        self.metrics.record(MetricEvent::RequestStarted);

        if let Err(error) = request.validate() {
            warn!("Answering invalid request from template: {error}");
            return self.template_result(request, &fingerprint, start);
        }

        if let Some(hit) = self.lookup(&fingerprint, start) {
            return hit;
        }

        loop {
            match self.cache.claim(fingerprint.as_str()) {
                Claim::Owner(guard) => {
                    // Another owner may have finished between lookup and claim.
                    if let Ok(Some(cached)) = self.cache.lookup(fingerprint.as_str()) {
                        debug!("Cache filled while claiming {fingerprint}");
                        self.metrics.record(MetricEvent::CacheHit);
                        let hit = cached.as_cache_hit(elapsed_ms(start));
                        guard.complete(hit.clone());
                        return hit;
                    }

                    let result = self.run_chain(request, &fingerprint, start).await;
                    // Template answers are shared with waiters but never cached,
                    // so a recovered provider is consulted on the next request.
                    if result.source.is_remote() {
                        self.remember(&fingerprint, &result);
                    }
                    guard.complete(result.clone());
                    return result;
                }
                Claim::Waiter(waiter) => {
                    if let Some(shared) = waiter.wait().await {
                        debug!("Shared in-flight result for {fingerprint}");
                        return shared;
                    }
                    debug!("In-flight owner for {fingerprint} went away, claiming again");
                }
            }
        }
    }

    /// Serves a live cache entry, recording the hit or miss.
    fn lookup(&self, fingerprint: &Fingerprint, start: Instant) -> Option<GenerationResult> {
        match self.cache.lookup(fingerprint.as_str()) {
            Ok(Some(cached)) => {
                self.metrics.record(MetricEvent::CacheHit);
                debug!("Cache hit for {fingerprint}");
                Some(cached.as_cache_hit(elapsed_ms(start)))
            }
            Ok(None) => {
                self.metrics.record(MetricEvent::CacheMiss);
                None
            }
            Err(error) => {
                debug!("Skipping cache: {error}");
                None
            }
        }
    }

    /// Caches a provider result; a full or disabled cache is not an error.
    fn remember(&self, fingerprint: &Fingerprint, result: &GenerationResult) {
        if let Err(error) = self.cache.store(fingerprint.as_str(), result.clone()) {
            debug!("Result not cached: {error}");
        }
    }

    /// Tries each available provider in order, then the template.
    async fn run_chain(
        &self,
        request: &GenerationRequest,
        fingerprint: &Fingerprint,
        start: Instant,
    ) -> GenerationResult {
        for entry in self.config.providers() {
            if !self.config.is_available(entry.id()).await {
                debug!("Skipping unavailable provider {}", entry.id());
                continue;
            }
            if let Some(result) = self.try_provider(entry, request, fingerprint, start).await {
                return result;
            }
        }

        warn!("All providers unavailable or exhausted, using template");
        self.template_result(request, fingerprint, start)
    }

    /// Calls one provider, recording the outcome.
    async fn try_provider(
        &self,
        entry: &ProviderEntry,
        request: &GenerationRequest,
        fingerprint: &Fingerprint,
        start: Instant,
    ) -> Option<GenerationResult> {
        let source = Source::Remote { rank: entry.rank };
        info!("Generating with {source} provider {}", entry.id());

        match entry.client.call(request).await {
            Ok(response) => {
                self.metrics.record(MetricEvent::ProviderSuccess {
                    provider: entry.id().to_owned(),
                    latency_ms: response.latency_ms,
                    tokens: response.tokens.total,
                    cost_usd: response.cost_usd,
                });
                let mut result = GenerationResult::from_provider(
                    response,
                    entry.rank,
                    entry.id(),
                    fingerprint.as_str(),
                );
                result.latency_ms = elapsed_ms(start);
                info!(
                    "{} answered in {}ms (${:.6})",
                    entry.id(),
                    result.latency_ms,
                    result.cost_usd
                );
                Some(result)
            }
            Err(error) => {
                warn!("Provider {} failed: {error}", entry.id());
                self.metrics.record(MetricEvent::ProviderError {
                    provider: entry.id().to_owned(),
                });
                None
            }
        }
    }

    /// Answers from the local template.
    fn template_result(
        &self,
        request: &GenerationRequest,
        fingerprint: &Fingerprint,
        start: Instant,
    ) -> GenerationResult {
        let text = self.template.generate(request);
        self.metrics.record(MetricEvent::TemplateFallback);
        GenerationResult::from_template(text, elapsed_ms(start), fingerprint.as_str())
    }

    /// Formatted metrics report.
    pub fn metrics_summary(&self) -> String {
        self.metrics.summary()
    }

    /// Re-checks every provider.
    pub async fn check_availability(&self) -> BTreeMap<String, bool> {
        self.config.check_availability().await
    }

    /// Provider chain and configuration.
    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    /// Cache layer.
    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    /// Metrics manager.
    pub fn metrics(&self) -> &Arc<MetricsManager> {
        &self.metrics
    }
}

/// Milliseconds since `start`.
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
