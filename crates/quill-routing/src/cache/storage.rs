//! Bounded in-memory response cache.
//!
//! Entries expire after a fixed TTL, checked lazily at lookup time. When the
//! cache is full the least recently used entry is evicted.

use quill_core::{CacheConfig, GenerationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// A cached generation result with metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The result as originally produced
    pub result: GenerationResult,
    /// When this entry was created
    pub inserted_at: SystemTime,
    /// When this entry stops being served
    pub expires_at: Instant,
    /// Access stamp used for LRU ordering
    pub last_accessed: u64,
}

impl CacheEntry {
    /// Checks if this cache entry has expired.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory response cache keyed by request fingerprint.
pub struct ResponseCache {
    /// Entries by fingerprint
    storage: HashMap<String, CacheEntry>,
    /// Maximum number of entries
    max_entries: usize,
    /// Lifetime of an entry
    ttl: Duration,
    /// Monotonic access counter
    tick: u64,
    /// Lookups that found a live entry
    hits: u64,
    /// Lookups that found nothing or an expired entry
    misses: u64,
    /// Entries removed to make room
    evictions: u64,
}

impl ResponseCache {
    /// Creates a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_entries, Duration::from_secs(config.ttl_seconds))
    }

    /// Creates a cache with explicit limits.
    pub fn with_limits(max_entries: usize, ttl: Duration) -> Self {
        Self {
            storage: HashMap::new(),
            max_entries,
            ttl,
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Gets a cached result if it exists and hasn't expired.
    pub fn get(&mut self, fingerprint: &str) -> Option<GenerationResult> {
        let now = Instant::now();
        self.tick += 1;
        let tick = self.tick;

        match self.storage.get_mut(fingerprint) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = tick;
                self.hits += 1;
                Some(entry.result.clone())
            }
            Some(_) => {
                self.storage.remove(fingerprint);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result, evicting the least recently used entry when full.
    pub fn put(&mut self, fingerprint: String, result: GenerationResult) {
        if self.max_entries == 0 {
            return;
        }

        let now = Instant::now();
        if !self.storage.contains_key(&fingerprint) && self.storage.len() >= self.max_entries {
            self.clear_expired();
            while self.storage.len() >= self.max_entries {
                self.evict_lru();
            }
        }

        self.tick += 1;
        self.storage.insert(
            fingerprint,
            CacheEntry {
                result,
                inserted_at: SystemTime::now(),
                expires_at: now + self.ttl,
                last_accessed: self.tick,
            },
        );
    }

    /// Evicts the least recently used entry.
    fn evict_lru(&mut self) {
        if let Some(key) = self
            .storage
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            debug!("Evicting cache entry {key}");
            self.storage.remove(&key);
            self.evictions += 1;
        }
    }

    /// Clears all expired entries from the cache.
    pub fn clear_expired(&mut self) {
        let now = Instant::now();
        self.storage.retain(|_, entry| !entry.is_expired(now));
    }

    /// Clears all entries from the cache.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.max_entries,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries evicted to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
