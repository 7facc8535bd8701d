//! Response caching and in-flight request deduplication.
//!
//! Results are cached by request fingerprint so repeated identical requests
//! never reach a provider twice within the TTL, and concurrent identical
//! requests share one upstream generation.

/// Concurrent generation registry
pub mod inflight;
/// Cache storage implementation
pub mod storage;

pub use inflight::{Claim, InFlightGuard, InFlightRegistry, InFlightWaiter};
pub use storage::{CacheEntry, CacheStats, ResponseCache};

use quill_core::{CacheConfig, Error, GenerationResult, IgnoreLock as _, Result};
use std::sync::Mutex;

/// Thread-safe cache plus in-flight registry shared by the orchestrator.
pub struct CacheLayer {
    /// Cache storage, `None` when caching is disabled
    cache: Option<Mutex<ResponseCache>>,
    /// Generations currently running
    inflight: InFlightRegistry,
}

impl CacheLayer {
    /// Creates the cache layer from its configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = (config.enabled && config.max_entries > 0)
            .then(|| Mutex::new(ResponseCache::new(config)));
        Self {
            cache,
            inflight: InFlightRegistry::new(),
        }
    }

    /// A cache layer that never stores anything; deduplication still applies.
    pub fn disabled() -> Self {
        Self {
            cache: None,
            inflight: InFlightRegistry::new(),
        }
    }

    /// Whether results are cached.
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Looks up a live entry.
    ///
    /// # Errors
    /// Returns `Error::CacheUnavailable` when caching is disabled.
    pub fn lookup(&self, fingerprint: &str) -> Result<Option<GenerationResult>> {
        Ok(self.storage()?.lock_ignore_poison().get(fingerprint))
    }

    /// Stores a result under its fingerprint.
    ///
    /// # Errors
    /// Returns `Error::CacheUnavailable` when caching is disabled.
    pub fn store(&self, fingerprint: &str, result: GenerationResult) -> Result<()> {
        self.storage()?
            .lock_ignore_poison()
            .put(fingerprint.to_owned(), result);
        Ok(())
    }

    /// Claims a fingerprint in the in-flight registry.
    pub fn claim(&self, fingerprint: &str) -> Claim {
        self.inflight.claim(fingerprint)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.lock_ignore_poison().len())
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache statistics; all zero when disabled.
    pub fn stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| cache.lock_ignore_poison().stats())
            .unwrap_or_default()
    }

    /// Drops expired entries.
    pub fn clear_expired(&self) {
        if let Some(cache) = &self.cache {
            cache.lock_ignore_poison().clear_expired();
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock_ignore_poison().clear();
        }
    }

    /// The storage, or `CacheUnavailable`.
    fn storage(&self) -> Result<&Mutex<ResponseCache>> {
        self.cache
            .as_ref()
            .ok_or_else(|| Error::CacheUnavailable("caching is disabled".to_owned()))
    }
}
