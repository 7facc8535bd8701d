//! Deduplication of concurrent identical generations.
//!
//! The first caller for a fingerprint becomes the owner and does the work.
//! Later callers subscribe to a `watch` channel and receive the owner's
//! result. If the owner is dropped without publishing, waiters see the
//! channel close with no value and claim again.

use quill_core::{GenerationResult, IgnoreLock as _};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch::{self, Receiver, Sender};
use tracing::debug;

/// Pending generations by fingerprint.
type Registry = Arc<Mutex<HashMap<String, Sender<Option<GenerationResult>>>>>;

/// Registry of generations currently running.
#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    /// Publishing side of each pending generation
    pending: Registry,
}

/// Outcome of claiming a fingerprint.
#[derive(Debug)]
pub enum Claim {
    /// Nobody else is generating; the caller must do it and publish.
    Owner(InFlightGuard),
    /// Another caller is generating; wait for its result.
    Waiter(InFlightWaiter),
}

impl InFlightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a fingerprint, atomically becoming its owner or a waiter.
    pub fn claim(&self, fingerprint: &str) -> Claim {
        let mut pending = self.pending.lock_ignore_poison();
        if let Some(sender) = pending.get(fingerprint) {
            debug!("Joining in-flight generation {fingerprint}");
            return Claim::Waiter(InFlightWaiter {
                receiver: sender.subscribe(),
            });
        }

        let (sender, _receiver) = watch::channel(None);
        pending.insert(fingerprint.to_owned(), sender);
        Claim::Owner(InFlightGuard {
            fingerprint: fingerprint.to_owned(),
            pending: Arc::clone(&self.pending),
            released: false,
        })
    }

    /// Number of generations currently registered.
    pub fn len(&self) -> usize {
        self.pending.lock_ignore_poison().len()
    }

    /// Whether no generation is registered.
    pub fn is_empty(&self) -> bool {
        self.pending.lock_ignore_poison().is_empty()
    }
}

/// Ownership of a pending generation. Dropping it without calling
/// [`InFlightGuard::complete`] releases the registration and wakes waiters
/// empty-handed.
#[derive(Debug)]
pub struct InFlightGuard {
    /// Fingerprint this guard owns
    fingerprint: String,
    /// Registry the guard removes itself from
    pending: Registry,
    /// Whether the registration was already removed
    released: bool,
}

impl InFlightGuard {
    /// Publishes the result to every waiter and releases the registration.
    pub fn complete(mut self, result: GenerationResult) {
        let sender = self.pending.lock_ignore_poison().remove(&self.fingerprint);
        self.released = true;
        if let Some(sender) = sender {
            // Stores the value even when nobody is subscribed.
            sender.send_replace(Some(result));
        }
    }

    /// Fingerprint owned by this guard.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!("Releasing unfinished generation {}", self.fingerprint);
            self.pending.lock_ignore_poison().remove(&self.fingerprint);
        }
    }
}

/// Handle for awaiting another caller's generation.
#[derive(Debug)]
pub struct InFlightWaiter {
    /// Subscription to the owner's result
    receiver: Receiver<Option<GenerationResult>>,
}

impl InFlightWaiter {
    /// Waits for the owner's result.
    ///
    /// Returns `None` when the owner went away without publishing.
    pub async fn wait(mut self) -> Option<GenerationResult> {
        loop {
            if let Some(result) = self.receiver.borrow_and_update().clone() {
                return Some(result);
            }
            if self.receiver.changed().await.is_err() {
                return self.receiver.borrow().clone();
            }
        }
    }
}
