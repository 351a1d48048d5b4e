//! Per-credential ordering locks.
//!
//! Classification is a read-modify-write on the event log (read the most
//! recent event, decide the direction, append). [`CredentialLocks`] hands
//! out one [`tokio::sync::Mutex`] per credential so that sequence runs
//! serially for the same credential while different credentials proceed
//! concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-credential async mutexes.
///
/// # Concurrency
///
/// - Two holders of the same credential are serialized in FIFO order.
/// - Different credentials never contend beyond the short map lookup.
/// - Entries nobody holds or waits on are pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct CredentialLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CredentialLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `credential`.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, credential: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            // Only the map holds a reference: no holder and no waiter.
            map.retain(|key, lock| key == credential || Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(credential.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Returns the number of credentials currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Returns `true` if no credential is tracked.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_credential_is_serialized() {
        let locks = CredentialLocks::new();
        let guard = locks.acquire("AB12").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("AB12")).await;
        assert!(second.is_err(), "second holder must wait");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire("AB12")).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_credentials_do_not_contend() {
        let locks = CredentialLocks::new();
        let _a = locks.acquire("AB12").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("CD34")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = CredentialLocks::new();
        drop(locks.acquire("AB12").await);
        drop(locks.acquire("CD34").await);
        let _held = locks.acquire("EF56").await;
        assert_eq!(locks.len().await, 1);
        assert!(!locks.is_empty().await);
    }
}
