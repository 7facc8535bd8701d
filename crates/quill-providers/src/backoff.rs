use quill_core::{Result, RetryConfig};
use rand::Rng as _;
use rand::thread_rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded exponential backoff for provider calls.
///
/// Attempt `n` (zero based) waits `base_delay * 2^n` before the next try,
/// capped at `max_delay`. With jitter enabled the wait is drawn uniformly
/// from zero up to that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Extra attempts after the first failure
    max_retries: u32,
    /// Delay after the first failed attempt
    base_delay: Duration,
    /// Upper bound for any single delay
    max_delay: Duration,
    /// Whether delays are randomized
    jitter: bool,
}

impl BackoffPolicy {
    /// Creates a policy without jitter.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter: false,
        }
    }

    /// Builds the policy for a provider from the shared retry settings.
    pub fn from_config(max_retries: u32, retry: &RetryConfig) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            jitter: retry.jitter,
        }
    }

    /// A single attempt with no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Enables or disables full jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic delay after the failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay actually slept, with jitter applied when enabled.
    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        Duration::from_millis(thread_rng().gen_range(0..=millis))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// The closure receives the zero-based attempt number. On success the
    /// value is returned together with the number of attempts used.
    ///
    /// # Errors
    /// Returns the first non-retryable error, or the last error once every
    /// attempt has failed.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok((value, attempt + 1)),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = self.sleep_duration(attempt);
                    warn!(
                        "{label}: attempt {}/{} failed: {error}; retrying in {}ms",
                        attempt + 1,
                        self.max_attempts(),
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!("{label}: giving up after {} attempt(s)", attempt + 1);
                    return Err(error);
                }
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(2, &RetryConfig::default())
    }
}
