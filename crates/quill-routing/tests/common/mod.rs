//! Shared helpers for pipeline tests.

use quill_core::{ProviderClient, QuillConfig};
use quill_routing::{InMemoryStore, KeyValueStore, Quill};
use std::env;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static INIT: Once = Once::new();

/// Routes pipeline logs through the test harness; `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = env::var("RUST_LOG")
            .unwrap_or_else(|_| "quill_routing=debug,quill_providers=debug".to_owned());
        let _result = fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    });
}

/// Default configuration that never reads API keys from the environment.
pub fn test_config() -> QuillConfig {
    let mut config = QuillConfig::default();
    for provider in &mut config.providers {
        provider.api_key_env = None;
    }
    config
}

/// Pipeline over the given providers with default settings and a fresh store.
pub fn quill_with(providers: Vec<Arc<dyn ProviderClient>>) -> Quill {
    quill_with_config(test_config(), providers)
}

/// Pipeline over the given providers with a fresh in-memory store.
pub fn quill_with_config(config: QuillConfig, providers: Vec<Arc<dyn ProviderClient>>) -> Quill {
    init_tracing();
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
    Quill::with_providers(config, providers, store)
}
