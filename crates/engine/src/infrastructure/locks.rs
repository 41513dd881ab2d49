//! TTL-bounded mutual-exclusion leases over store keys.
//!
//! A lease is a `set_if_absent` with a unique token; release is a
//! compare-and-delete on that token, so a holder whose lease already
//! expired can never delete a successor's lock. Acquisition retries on a
//! fixed step a fixed number of times and then reports "not obtained" -
//! callers decide whether to retry at a higher level, and must treat the
//! guarded resource as busy, not absent.
//!
//! Three lease classes are in use: per-session mutation (sized to one
//! read-modify-write), per-actor, and per-credential (serializing
//! identify/handshake attempts on a shared worker credential). A lease
//! must be released on every exit path of its critical section; a leaked
//! lease starves writers until the TTL clears it.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::infrastructure::ports::{Store, StoreError};

/// Lease classes with their timeouts.
pub const SESSION_LEASE: Duration = Duration::from_millis(250);
pub const ACTOR_LEASE: Duration = Duration::from_secs(3);
pub const CREDENTIAL_LEASE: Duration = Duration::from_secs(5);

/// A held lease. Release it through [`LockManager::release`].
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    token: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

pub struct LockManager {
    store: Arc<dyn Store>,
    retry_step: Duration,
    max_attempts: u32,
}

impl LockManager {
    pub fn new(store: Arc<dyn Store>, retry_step: Duration, max_attempts: u32) -> Self {
        Self {
            store,
            retry_step,
            max_attempts,
        }
    }

    /// Try to take the lease, retrying on the configured step.
    ///
    /// `Ok(None)` means contention, never an error; the store only fails
    /// this call when it is unreachable.
    pub async fn acquire(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockGuard>, StoreError> {
        let token = Uuid::new_v4().to_string();
        for attempt in 0..self.max_attempts {
            if self.store.set_if_absent(key, &token, lease).await? {
                return Ok(Some(LockGuard {
                    key: key.to_string(),
                    token,
                }));
            }
            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.retry_step).await;
            }
        }
        tracing::debug!(key, attempts = self.max_attempts, "lease not obtained");
        Ok(None)
    }

    /// Release a held lease. Returns false when the lease had already
    /// expired and been taken over.
    pub async fn release(&self, guard: LockGuard) -> Result<bool, StoreError> {
        self.store.delete_if_equals(&guard.key, &guard.token).await
    }
}
