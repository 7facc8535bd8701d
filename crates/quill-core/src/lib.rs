//! Core types and traits for Quill review generation.
//!
//! This crate provides the request and result data model, request
//! fingerprinting, error handling, configuration and the provider trait
//! shared by every other crate in the workspace.

/// Configuration types and loading.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Request fingerprinting.
pub mod fingerprint;
/// Poison-tolerant mutex locking.
pub mod sync;
/// Trait definitions for review providers.
pub mod traits;
/// Core data types for requests, responses and results.
pub mod types;

pub use config::{
    CacheConfig, ENV_CONFIG_PATH, ExperimentConfig, MonitoringConfig, ProviderConfig, ProxyConfig,
    QuillConfig, RetryConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, canonical_form};
pub use sync::IgnoreLock;
pub use traits::ProviderClient;
pub use types::{
    GenerationRequest, GenerationResult, ProviderResponse, Source, TEMPLATE_MODEL_ID, TokenUsage,
    TripType, Voice,
};
