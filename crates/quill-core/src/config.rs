//! Configuration types for providers, proxy routing, caching and monitoring.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment variable overriding the config file location.
pub const ENV_CONFIG_PATH: &str = "QUILL_CONFIG";

/// Complete Quill configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Remote providers, consulted in `priority` order
    pub providers: Vec<ProviderConfig>,
    /// Same-origin proxy routing
    pub proxy: ProxyConfig,
    /// Response cache policy
    pub cache: CacheConfig,
    /// Backoff between provider retries
    pub retry: RetryConfig,
    /// Alert thresholds and background intervals
    pub monitoring: MonitoringConfig,
    /// A/B experiment labels
    pub experiments: ExperimentConfig,
    /// API keys keyed by provider id, used only when proxy routing is off
    pub api_keys: BTreeMap<String, String>,
    /// Where persisted state lives
    pub storage: StorageConfig,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig::openai(), ProviderConfig::groq()],
            proxy: ProxyConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            monitoring: MonitoringConfig::default(),
            experiments: ExperimentConfig::default(),
            api_keys: BTreeMap::new(),
            storage: StorageConfig::default(),
        }
    }
}

/// Settings for one OpenAI-compatible chat completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier, also used in proxy paths
    pub id: String,
    /// Chat completion endpoint used in direct mode
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model_id: String,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Price in USD per thousand tokens
    pub cost_per_1k_tokens: f64,
    /// Lower values are tried first
    pub priority: u32,
    /// Disabled providers are never called
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion length limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable holding the API key in direct mode
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Serde default helper.
const fn default_true() -> bool {
    true
}

/// Serde default helper.
const fn default_temperature() -> f32 {
    0.7
}

/// Serde default helper.
const fn default_max_tokens() -> u32 {
    300
}

impl ProviderConfig {
    /// OpenAI chat completions, the default primary provider.
    pub fn openai() -> Self {
        Self {
            id: "openai".to_owned(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
            model_id: "gpt-4o-mini".to_owned(),
            timeout_ms: 10_000,
            max_retries: 2,
            cost_per_1k_tokens: 0.0006,
            priority: 0,
            enabled: true,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: Some("OPENAI_API_KEY".to_owned()),
        }
    }

    /// Groq's OpenAI-compatible endpoint, the default secondary provider.
    pub fn groq() -> Self {
        Self {
            id: "groq".to_owned(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_owned(),
            model_id: "llama-3.1-8b-instant".to_owned(),
            timeout_ms: 8_000,
            max_retries: 2,
            cost_per_1k_tokens: 0.000_08,
            priority: 1,
            enabled: true,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: Some("GROQ_API_KEY".to_owned()),
        }
    }
}

/// Routing of provider calls through a same-origin proxy.
///
/// When enabled the proxy injects credentials server-side and no key is ever
/// attached by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Whether calls go through the proxy
    pub enabled: bool,
    /// Origin serving `/api/llm-proxy/<provider>`
    pub base_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:3000".to_owned(),
        }
    }
}

impl ProxyConfig {
    /// Proxy endpoint for a provider.
    pub fn endpoint_for(&self, provider_id: &str) -> String {
        format!(
            "{}/api/llm-proxy/{provider_id}",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum number of cached reviews
    pub max_entries: usize,
    /// Time-to-live for cache entries in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100,
            ttl_seconds: 3600,
        }
    }
}

/// Backoff between provider retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry; doubles for each further retry
    pub base_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
    /// Randomize each delay between zero and its computed value
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

/// Alert thresholds and background task intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Provider error rate (0.0-1.0) above which an alert fires
    pub error_rate_threshold: f64,
    /// Average provider latency above which an alert fires
    pub avg_latency_ms_threshold: u64,
    /// Cost of the current day above which an alert fires
    pub daily_cost_threshold_usd: f64,
    /// Provider outcomes required before the error rate is evaluated
    pub min_samples_for_error_rate: u64,
    /// How often counters are flushed to the key-value store
    pub persist_interval_seconds: u64,
    /// Age after which cached provider availability is checked again; zero
    /// checks on every lookup
    pub availability_refresh_seconds: u64,
    /// Buffered alerts per subscriber
    pub alert_channel_capacity: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold: 0.2,
            avg_latency_ms_threshold: 5_000,
            daily_cost_threshold_usd: 5.0,
            min_samples_for_error_rate: 10,
            persist_interval_seconds: 60,
            availability_refresh_seconds: 300,
            alert_channel_capacity: 64,
        }
    }
}

/// A/B experiment settings. Variants are recorded in metrics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Labels sessions are spread across
    pub variants: Vec<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            variants: vec!["control".to_owned(), "treatment".to_owned()],
        }
    }
}

/// Persisted state locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File backing the metrics store; defaults to `~/.quill/state.json`
    pub state_path: Option<PathBuf>,
}

impl QuillConfig {
    /// Get the default config directory path (`~/.quill`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        use dirs::home_dir;
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".quill"))
    }

    /// Get the config file path, honouring `QUILL_CONFIG`
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        match env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(Self::config_dir()?.join("config.toml")),
        }
    }

    /// Load config from the default location, creating it with defaults if missing
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        use toml::from_str;
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = from_str(&contents)
            .map_err(|error| Error::Config(format!("Failed to parse config: {error}")))?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?}: {} providers, proxy={}",
            path,
            config.providers.len(),
            config.proxy.enabled
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        use toml::to_string_pretty;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Quill Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Checks provider ids are unique and endpoints and limits are usable.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(Error::Config("provider id must not be empty".to_owned()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
            if provider.endpoint.trim().is_empty() && !self.proxy.enabled {
                return Err(Error::Config(format!(
                    "provider {} has no endpoint",
                    provider.id
                )));
            }
            if provider.timeout_ms == 0 {
                return Err(Error::Config(format!(
                    "provider {} has a zero timeout",
                    provider.id
                )));
            }
            if provider.cost_per_1k_tokens < 0.0 {
                return Err(Error::Config(format!(
                    "provider {} has a negative cost rate",
                    provider.id
                )));
            }
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(Error::Config(
                "cache.max_entries must be positive when the cache is enabled".to_owned(),
            ));
        }
        Ok(())
    }

    /// Enabled providers, sorted by priority then declaration order.
    pub fn providers_by_priority(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> = self
            .providers
            .iter()
            .filter(|provider| provider.enabled)
            .cloned()
            .collect();
        providers.sort_by_key(|provider| provider.priority);
        providers
    }

    /// Get the API key for a provider, checking config first, then its environment variable
    pub fn get_api_key(&self, provider: &ProviderConfig) -> Option<String> {
        self.api_keys
            .get(&provider.id)
            .filter(|key| !key.is_empty())
            .cloned()
            .or_else(|| {
                provider
                    .api_key_env
                    .as_deref()
                    .and_then(|name| env::var(name).ok())
                    .filter(|key| !key.is_empty())
            })
    }

    /// Location of the persisted state file.
    ///
    /// # Errors
    /// Returns an error if no path is configured and the home directory is unknown
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.storage.state_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("state.json")),
        }
    }
}
