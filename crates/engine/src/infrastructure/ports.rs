//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Ports exist for:
//! - The shared store (in-memory adapter in-tree; a networked adapter is a
//!   deployment concern behind the same trait and key contract)
//! - Voice control (the chat-platform SDK enacts mute/deafen changes)
//! - Clock/Random (for testing)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crewmute_domain::{ConnectCode, GuildId, UserId, VoiceState};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network/connection failure to the shared store. Callers on
    /// availability-sensitive paths degrade to a safe default instead of
    /// propagating this.
    #[error("store unreachable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("voice update rejected: {0}")]
    Rejected(String),
}

// =============================================================================
// Store Port
// =============================================================================

/// Handle on a pub/sub topic subscription.
///
/// Store adapters forward published payloads into the channel; dropping the
/// subscription unsubscribes.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Wait for the next published payload, up to `timeout`.
    pub async fn recv(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok()?
    }
}

/// The shared store every process coordinates through.
///
/// Key shapes follow the cross-process contract in
/// [`crate::infrastructure::keys::KeySpace`]: TTL'd text keys, FIFO lists,
/// score-ordered sets, and session-scoped pub/sub topics.
#[async_trait]
pub trait Store: Send + Sync {
    // --- text keys ---
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    /// Set only if the key does not already exist; the basis of leases.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, StoreError>;
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    /// Delete only if the stored value matches; the basis of safe lease
    /// release.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
    /// Remaining TTL, or `None` when the key is missing or persistent.
    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>, StoreError>;
    /// Increment a counter key, creating it at 1. Preserves any TTL.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    // --- FIFO lists ---
    /// Append to the tail; returns the new length.
    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError>;
    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Blocking pop bounded by `timeout`; `None` on timeout.
    async fn pop_front_wait(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    // --- score-ordered sets ---
    async fn scored_insert(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError>;
    async fn scored_count(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError>;
    /// Remove members with score strictly below `cutoff`; returns the count
    /// removed.
    async fn scored_remove_below(&self, key: &str, cutoff: f64) -> Result<u64, StoreError>;

    // --- pub/sub ---
    /// Returns the number of subscribers the payload reached.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<usize, StoreError>;
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError>;
}

// =============================================================================
// External Collaborator Ports
// =============================================================================

/// Enacts a computed mute/deafen state through the chat platform.
///
/// `delay` is the anti-flap window from the ruleset's transition-delay
/// table; the adapter waits it out (or coalesces) before touching the user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceControl: Send + Sync {
    async fn apply(
        &self,
        guild: &GuildId,
        user: &UserId,
        state: VoiceState,
        delay: Duration,
    ) -> Result<(), VoiceError>;
}

// =============================================================================
// Clock / Random Ports
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait Random: Send + Sync {
    /// A fresh capture-agent pairing secret.
    fn connect_code(&self) -> ConnectCode;
}
