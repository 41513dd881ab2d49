//! Rate-limit and abuse guard: cooldown markers, sliding-window softban
//! escalation, and the per-(guild, credential) throttle.
//!
//! Every check degrades to its safe default when the store is unreachable
//! - a rate limiter that fails closed would take the whole feature down
//! with it. Failures are logged, never propagated.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::keys::KeySpace;
use crate::infrastructure::ports::{Clock, Store};
use crewmute_domain::{GuildId, UserId};

/// Counter value written by a blackout; any realistic usage cap is below
/// it, so the throttle reads the key as exhausted until the TTL clears.
const BLACKOUT_COUNT: i64 = 1_000_000;

/// Windows and thresholds for the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Marker preventing immediate re-invocation of any guarded action.
    pub general_cooldown: Duration,
    /// Trailing window violations are counted over.
    pub violation_window: Duration,
    /// Violations tolerated within the window before escalation.
    pub violation_threshold: u64,
    /// How long a softban lasts.
    pub softban_duration: Duration,
    /// Expiry refreshed on each allowed credential use.
    pub throttle_window: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            general_cooldown: Duration::from_secs(1),
            violation_window: Duration::from_secs(600),
            violation_threshold: 3,
            softban_duration: Duration::from_secs(300),
            throttle_window: Duration::from_secs(5),
        }
    }
}

pub struct AbuseGuard {
    store: Arc<dyn Store>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    settings: GuardSettings,
}

impl AbuseGuard {
    pub fn new(
        store: Arc<dyn Store>,
        keys: KeySpace,
        clock: Arc<dyn Clock>,
        settings: GuardSettings,
    ) -> Self {
        Self {
            store,
            keys,
            clock,
            settings,
        }
    }

    /// Arm the short general cooldown for an actor.
    pub async fn mark_general_cooldown(&self, actor: &UserId) {
        let key = self.keys.general_cooldown(actor);
        if let Err(err) = self
            .store
            .set(&key, "1", self.settings.general_cooldown)
            .await
        {
            tracing::warn!(error = %err, "failed to mark general cooldown");
        }
    }

    /// Arm an action-specific cooldown. A zero TTL is a no-op.
    pub async fn mark_action_cooldown(&self, actor: &UserId, action: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = self.keys.action_cooldown(actor, action);
        if let Err(err) = self.store.set(&key, "1", ttl).await {
            tracing::warn!(error = %err, "failed to mark action cooldown");
        }
    }

    /// Log one violation; returns true when this one escalated to a
    /// softban. Entries older than the window are pruned in the background.
    pub async fn record_violation(&self, actor: &UserId) -> bool {
        let key = self.keys.softban_log(actor);
        let now_ms = self.clock.now().timestamp_millis();
        let member = format!("{}:{}", now_ms, Uuid::new_v4().simple());
        if let Err(err) = self.store.scored_insert(&key, now_ms as f64, &member).await {
            tracing::warn!(error = %err, "failed to record violation; not escalating");
            return false;
        }

        let window_start = now_ms as f64 - self.settings.violation_window.as_millis() as f64;
        let in_window = match self.store.scored_count(&key, window_start, f64::MAX).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "failed to count violations; not escalating");
                return false;
            }
        };

        if in_window > self.settings.violation_threshold {
            if let Err(err) = self
                .store
                .set(&self.keys.softban(actor), "1", self.settings.softban_duration)
                .await
            {
                tracing::warn!(error = %err, "failed to install softban marker");
            }
            tracing::info!(actor = %actor, violations = in_window, "actor softbanned");
            return true;
        }

        // best-effort prune of stale entries, off the hot path
        let store = Arc::clone(&self.store);
        let _ = tokio::spawn(async move {
            if let Err(err) = store.scored_remove_below(&key, window_start).await {
                tracing::warn!(error = %err, "violation-log prune failed");
            }
        });
        false
    }

    pub async fn is_banned(&self, actor: &UserId) -> bool {
        self.marker_exists(self.keys.softban(actor)).await
    }

    pub async fn is_on_cooldown(&self, actor: &UserId) -> bool {
        self.marker_exists(self.keys.general_cooldown(actor)).await
    }

    pub async fn is_on_action_cooldown(&self, actor: &UserId, action: &str) -> bool {
        self.marker_exists(self.keys.action_cooldown(actor, action))
            .await
    }

    /// Count one use of a worker credential for a guild. Returns whether
    /// the credential is still usable; an allowed use refreshes the short
    /// counter expiry, a denied one leaves the key to age out (or to sit
    /// through an explicit blackout).
    pub async fn throttle_credential(
        &self,
        guild: &GuildId,
        credential_hash: &str,
        max: i64,
    ) -> bool {
        let key = self.keys.credential_throttle(guild, credential_hash);
        let count = match self.store.increment(&key).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "credential throttle unavailable; allowing use");
                return true;
            }
        };
        if count < max {
            if let Err(err) = self.store.expire(&key, self.settings.throttle_window).await {
                tracing::warn!(error = %err, "failed to refresh throttle expiry");
            }
            true
        } else {
            false
        }
    }

    /// Denylist a credential for a guild by overwriting its usage counter
    /// with an exhausted value for `duration`.
    pub async fn blackout_credential(
        &self,
        guild: &GuildId,
        credential_hash: &str,
        duration: Duration,
    ) {
        let key = self.keys.credential_throttle(guild, credential_hash);
        if let Err(err) = self
            .store
            .set(&key, &BLACKOUT_COUNT.to_string(), duration)
            .await
        {
            tracing::warn!(error = %err, "failed to blackout credential");
        }
    }

    async fn marker_exists(&self, key: String) -> bool {
        match self.store.exists(&key).await {
            Ok(exists) => exists,
            Err(err) => {
                // fail open: an unreachable store must not lock everyone out
                tracing::warn!(error = %err, key, "marker check unavailable; assuming clear");
                false
            }
        }
    }
}
