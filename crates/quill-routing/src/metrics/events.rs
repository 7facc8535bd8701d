//! Events fed into the metrics manager and alerts it emits.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Something that happened while serving a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricEvent {
    /// A generation request arrived
    RequestStarted,
    /// A provider produced a review
    ProviderSuccess {
        /// Provider identifier
        provider: String,
        /// Call latency including retries
        latency_ms: u64,
        /// Tokens billed
        tokens: u64,
        /// Cost in USD
        cost_usd: f64,
    },
    /// A provider failed after exhausting its retries
    ProviderError {
        /// Provider identifier
        provider: String,
    },
    /// A request was answered from the cache
    CacheHit,
    /// A request was not in the cache
    CacheMiss,
    /// The template engine answered a request
    TemplateFallback,
}

/// Which threshold an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Provider error rate above threshold
    ErrorRate,
    /// Average provider latency above threshold
    Latency,
    /// Today's cost above threshold
    Cost,
}

impl AlertKind {
    /// Label used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ErrorRate => "error_rate",
            Self::Latency => "latency",
            Self::Cost => "cost",
        }
    }
}

impl Display for AlertKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Threshold that was crossed
    pub kind: AlertKind,
    /// Observed value
    pub value: f64,
    /// Configured threshold
    pub threshold: f64,
    /// Human readable description
    pub message: String,
}
