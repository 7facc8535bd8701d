use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while generating, caching or accounting reviews.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Connecting to a provider failed.
    #[error("Network error: {0}")]
    Network(String),

    /// A provider attempt exceeded its timeout.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// A provider answered with a non-success status.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Identifier of the failing provider
        provider: String,
        /// Status line or body returned by the provider
        message: String,
    },

    /// Provider returned a body that could not be used.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// The response cache cannot be used; callers degrade to no-cache.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Metrics could not be written to or read from the key-value store.
    #[error("Failed to persist metrics: {0}")]
    MetricsPersist(String),

    /// The generation request violates its invariants.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Timeouts, connection failures and bad provider answers are transient;
    /// configuration and credential problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_)
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::Provider { .. }
                | Self::InvalidResponse(_)
        )
    }

    /// Builds a provider error for the given provider id.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
