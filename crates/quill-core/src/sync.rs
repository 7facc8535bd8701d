//! Synchronization utilities for handling poisoned locks.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that ignores lock poisoning.
///
/// Cache and metrics state stay usable after a panicking request: the
/// original panic is the error worth reporting, not the poisoned lock.
pub trait IgnoreLock<T> {
    /// Lock the mutex, ignoring any poison error.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_survives_poisoning() {
        let shared = Arc::new(Mutex::new(1_u32));
        let poisoner = Arc::clone(&shared);
        let outcome = thread::spawn(move || {
            let _guard = poisoner.lock_ignore_poison();
            panic!("poison the lock");
        })
        .join();
        assert!(outcome.is_err());

        *shared.lock_ignore_poison() += 1;
        assert_eq!(*shared.lock_ignore_poison(), 2);
    }
}
