//! Mock provider for testing the fallback chain.
//!
//! Outcomes are scripted per call, so tests can make a provider succeed,
//! time out or fail on any given attempt without a network.

use async_trait::async_trait;
use quill_core::{
    Error, GenerationRequest, IgnoreLock as _, ProviderClient, ProviderResponse, Result,
    TokenUsage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// What a single call to a [`MockProvider`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Return this review text
    Text(String),
    /// Fail with a timeout
    Timeout,
    /// Fail with a connection error
    NetworkError,
    /// Fail with a non-success HTTP status
    Status(u16),
}

impl MockOutcome {
    /// Converts a failure outcome into the error a real provider would return.
    fn into_error(self, provider: &str) -> Error {
        match self {
            Self::Text(_) => Error::Other("mock outcome is not a failure".to_owned()),
            Self::Timeout => Error::Timeout(0),
            Self::NetworkError => Error::Network(format!("{provider}: connection refused")),
            Self::Status(status) => Error::provider(provider, format!("HTTP {status}")),
        }
    }
}

/// Mock provider that plays back scripted outcomes.
///
/// Once the script runs out every call returns the fallback outcome, which by
/// default is a short review naming the hotel.
#[derive(Clone)]
pub struct MockProvider {
    /// Identifier of this mock provider
    id: String,
    /// Model identifier reported in responses
    model_id: String,
    /// Price per thousand tokens
    cost_per_1k_tokens: f64,
    /// Outcomes consumed one per call
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    /// Outcome used once the script is exhausted
    fallback: Arc<Mutex<Option<MockOutcome>>>,
    /// Delay applied before every call
    delay: Duration,
    /// Availability flag
    available: Arc<AtomicBool>,
    /// Number of calls made
    calls: Arc<AtomicUsize>,
    /// Hotel names seen, for verification
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with a given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            model_id: format!("{id}-mock"),
            id,
            cost_per_1k_tokens: 0.0,
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(None)),
            delay: Duration::ZERO,
            available: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicUsize::new(0)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue an outcome for the next unscripted call.
    #[must_use]
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.script.lock_ignore_poison().push_back(outcome);
        self
    }

    /// Queue a successful response.
    #[must_use]
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_outcome(MockOutcome::Text(text.into()))
    }

    /// Set the outcome used once the script is exhausted.
    #[must_use]
    pub fn with_fallback(self, outcome: MockOutcome) -> Self {
        *self.fallback.lock_ignore_poison() = Some(outcome);
        self
    }

    /// Make every call fail with the given outcome.
    #[must_use]
    pub fn failing(self, outcome: MockOutcome) -> Self {
        self.with_fallback(outcome)
    }

    /// Wait this long before answering each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Price responses at this rate.
    #[must_use]
    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Toggle availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Get the hotel names of every call made.
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock_ignore_poison().clone()
    }

    /// Next outcome: scripted first, then the fallback.
    fn next_outcome(&self, request: &GenerationRequest) -> MockOutcome {
        if let Some(outcome) = self.script.lock_ignore_poison().pop_front() {
            return outcome;
        }
        self.fallback.lock_ignore_poison().clone().unwrap_or_else(|| {
            MockOutcome::Text(format!(
                "Mock review: {} earned {} stars from us.",
                request.hotel_name.trim(),
                request.rating
            ))
        })
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn call(&self, request: &GenerationRequest) -> Result<ProviderResponse> {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_history
            .lock_ignore_poison()
            .push(request.hotel_name.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_outcome(request) {
            MockOutcome::Text(text) => {
                let tokens = TokenUsage::estimate_from_text(&text);
                Ok(ProviderResponse {
                    cost_usd: tokens.cost_usd(self.cost_per_1k_tokens),
                    text,
                    model_id: self.model_id.clone(),
                    tokens,
                    latency_ms: start.elapsed().as_millis() as u64,
                    attempts: 1,
                })
            }
            failure => Err(failure.into_error(&self.id)),
        }
    }
}
