//! Serializable metrics state.

use chrono::{DateTime, Utc};
use quill_core::MonitoringConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::events::{AlertKind, MetricEvent};

/// Request-level counters.
///
/// `success` and `error` count provider call outcomes; requests answered by
/// the cache or the template count only towards `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCounters {
    /// Requests received
    pub total: u64,
    /// Provider calls that produced a review
    pub success: u64,
    /// Provider calls that failed
    pub error: u64,
}

/// Counters for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderStats {
    /// Successful calls
    pub successes: u64,
    /// Failed calls
    pub errors: u64,
    /// Tokens billed
    pub tokens: u64,
    /// Cost in USD
    pub cost_usd: f64,
    /// Sum of successful call latencies
    pub latency_sum_ms: u64,
}

impl ProviderStats {
    /// Average latency of successful calls.
    pub fn avg_latency_ms(&self) -> u64 {
        self.latency_sum_ms.checked_div(self.successes).unwrap_or(0)
    }
}

/// Cache lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCounters {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
}

/// Provider latency distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyStats {
    /// Sum of latencies
    pub sum_ms: u64,
    /// Number of samples
    pub count: u64,
    /// Fastest sample
    pub min_ms: Option<u64>,
    /// Slowest sample
    pub max_ms: u64,
}

impl LatencyStats {
    /// Adds a sample.
    pub fn observe(&mut self, latency_ms: u64) {
        self.sum_ms = self.sum_ms.saturating_add(latency_ms);
        self.count += 1;
        self.min_ms = Some(self.min_ms.map_or(latency_ms, |min| min.min(latency_ms)));
        self.max_ms = self.max_ms.max(latency_ms);
    }

    /// Mean latency, 0 without samples.
    pub fn average_ms(&self) -> u64 {
        self.sum_ms.checked_div(self.count).unwrap_or(0)
    }
}

/// Spend by day (`YYYY-MM-DD`), by month (`YYYY-MM`) and overall.
///
/// Every ledger only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLedger {
    /// Cost per UTC day
    pub daily: BTreeMap<String, f64>,
    /// Cost per UTC month
    pub monthly: BTreeMap<String, f64>,
    /// Cost since the ledger was created
    pub total_usd: f64,
}

impl CostLedger {
    /// Adds a cost at the given time. Negative or non-finite costs are ignored.
    pub fn add(&mut self, cost_usd: f64, now: DateTime<Utc>) {
        if !cost_usd.is_finite() || cost_usd <= 0.0 {
            return;
        }
        *self.daily.entry(day_key(now)).or_default() += cost_usd;
        *self.monthly.entry(month_key(now)).or_default() += cost_usd;
        self.total_usd += cost_usd;
    }

    /// Cost recorded for a day key.
    pub fn for_day(&self, day: &str) -> f64 {
        self.daily.get(day).copied().unwrap_or(0.0)
    }

    /// Cost recorded for a month key.
    pub fn for_month(&self, month: &str) -> f64 {
        self.monthly.get(month).copied().unwrap_or(0.0)
    }
}

/// `YYYY-MM-DD` key for a timestamp.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM` key for a timestamp.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Thresholds in force when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Error rate (0.0-1.0); zero disables the alert
    pub error_rate: f64,
    /// Average latency; zero disables the alert
    pub avg_latency_ms: u64,
    /// Daily cost; zero disables the alert
    pub daily_cost_usd: f64,
    /// Provider outcomes needed before the error rate counts
    pub min_samples: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self::from(&MonitoringConfig::default())
    }
}

impl From<&MonitoringConfig> for AlertThresholds {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            error_rate: config.error_rate_threshold,
            avg_latency_ms: config.avg_latency_ms_threshold,
            daily_cost_usd: config.daily_cost_threshold_usd,
            min_samples: config.min_samples_for_error_rate,
        }
    }
}

/// Alerts fired so far and which ones are currently raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertState {
    /// Error rate alerts fired
    pub error_rate_fired: u64,
    /// Latency alerts fired
    pub latency_fired: u64,
    /// Cost alerts fired
    pub cost_fired: u64,
    /// Error rate is above threshold
    pub error_rate_raised: bool,
    /// Latency is above threshold
    pub latency_raised: bool,
    /// Day the cost alert last fired
    pub cost_alerted_day: Option<String>,
}

impl AlertState {
    /// Alerts fired of the given kind.
    pub fn fired(&self, kind: AlertKind) -> u64 {
        match kind {
            AlertKind::ErrorRate => self.error_rate_fired,
            AlertKind::Latency => self.latency_fired,
            AlertKind::Cost => self.cost_fired,
        }
    }
}

/// Complete metrics state, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Request counters
    pub requests: RequestCounters,
    /// Per-provider counters
    pub providers: BTreeMap<String, ProviderStats>,
    /// Cache counters
    pub cache: CacheCounters,
    /// Requests answered by the template engine
    pub template_fallbacks: u64,
    /// Provider latency
    pub latency: LatencyStats,
    /// Spend ledgers
    pub costs: CostLedger,
    /// Thresholds in force
    pub thresholds: AlertThresholds,
    /// Alert bookkeeping
    pub alerts: AlertState,
    /// Sessions assigned to each A/B variant
    pub variants: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Applies one event.
    pub fn apply(&mut self, event: &MetricEvent, now: DateTime<Utc>) {
        match event {
            MetricEvent::RequestStarted => self.requests.total += 1,
            MetricEvent::ProviderSuccess {
                provider,
                latency_ms,
                tokens,
                cost_usd,
            } => {
                self.requests.success += 1;
                let stats = self.providers.entry(provider.clone()).or_default();
                stats.successes += 1;
                stats.tokens = stats.tokens.saturating_add(*tokens);
                stats.latency_sum_ms = stats.latency_sum_ms.saturating_add(*latency_ms);
                if cost_usd.is_finite() && *cost_usd > 0.0 {
                    stats.cost_usd += cost_usd;
                }
                self.latency.observe(*latency_ms);
                self.costs.add(*cost_usd, now);
            }
            MetricEvent::ProviderError { provider } => {
                self.requests.error += 1;
                self.providers.entry(provider.clone()).or_default().errors += 1;
            }
            MetricEvent::CacheHit => self.cache.hits += 1,
            MetricEvent::CacheMiss => self.cache.misses += 1,
            MetricEvent::TemplateFallback => self.template_fallbacks += 1,
        }
    }

    /// Provider outcomes counted towards the error rate.
    pub fn provider_samples(&self) -> u64 {
        self.requests.success + self.requests.error
    }

    /// Failed provider calls over all provider calls.
    pub fn error_rate(&self) -> f64 {
        match self.provider_samples() {
            0 => 0.0,
            samples => self.requests.error as f64 / samples as f64,
        }
    }

    /// Average provider latency.
    pub fn avg_latency_ms(&self) -> u64 {
        self.latency.average_ms()
    }

    /// Cache hits over cache lookups.
    pub fn cache_hit_rate(&self) -> f64 {
        match self.cache.hits + self.cache.misses {
            0 => 0.0,
            lookups => self.cache.hits as f64 / lookups as f64,
        }
    }

    /// Cost recorded for the current UTC day.
    pub fn cost_today(&self) -> f64 {
        self.costs.for_day(&day_key(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use serde_json::from_str;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn test_ledger_keys_and_totals() {
        let mut ledger = CostLedger::default();
        ledger.add(0.5, at(1));
        ledger.add(0.25, at(1));
        ledger.add(1.0, at(2));
        ledger.add(-3.0, at(2));
        ledger.add(f64::NAN, at(2));

        assert!((ledger.for_day("2026-03-01") - 0.75).abs() < 1e-9);
        assert!((ledger.for_day("2026-03-02") - 1.0).abs() < 1e-9);
        assert!((ledger.for_month("2026-03") - 1.75).abs() < 1e-9);
        assert!((ledger.total_usd - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_apply_updates_counters() {
        let mut snapshot = MetricsSnapshot::default();
        snapshot.apply(&MetricEvent::RequestStarted, at(1));
        snapshot.apply(
            &MetricEvent::ProviderSuccess {
                provider: "openai".to_owned(),
                latency_ms: 300,
                tokens: 120,
                cost_usd: 0.01,
            },
            at(1),
        );
        snapshot.apply(
            &MetricEvent::ProviderError {
                provider: "groq".to_owned(),
            },
            at(1),
        );
        snapshot.apply(&MetricEvent::CacheMiss, at(1));
        snapshot.apply(&MetricEvent::CacheHit, at(1));
        snapshot.apply(&MetricEvent::TemplateFallback, at(1));

        assert_eq!(snapshot.requests.total, 1);
        assert!((snapshot.error_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.avg_latency_ms(), 300);
        assert_eq!(snapshot.latency.min_ms, Some(300));
        assert!((snapshot.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.template_fallbacks, 1);
        assert_eq!(snapshot.providers["openai"].tokens, 120);
        assert_eq!(snapshot.providers["groq"].errors, 1);
    }

    #[test]
    fn test_total_equals_sum_of_provider_costs() {
        let mut snapshot = MetricsSnapshot::default();
        for (provider, cost) in [("openai", 0.2), ("groq", 0.05), ("openai", 0.1)] {
            snapshot.apply(
                &MetricEvent::ProviderSuccess {
                    provider: provider.to_owned(),
                    latency_ms: 10,
                    tokens: 10,
                    cost_usd: cost,
                },
                at(4),
            );
        }
        let provider_sum: f64 = snapshot.providers.values().map(|stats| stats.cost_usd).sum();
        assert!((snapshot.costs.total_usd - provider_sum).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let parsed: MetricsSnapshot =
            from_str(r#"{"requests":{"total":4}}"#).unwrap_or_default();
        assert_eq!(parsed.requests.total, 4);
        assert_eq!(parsed.thresholds, AlertThresholds::default());
    }
}
