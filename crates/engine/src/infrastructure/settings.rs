//! Engine configuration.
//!
//! One explicit settings object passed to constructors - there is no
//! ambient global state. The embedding process decides where values come
//! from; `from_env` covers the common deployment shape.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::guard::GuardSettings;
use crewmute_domain::{RulesetKind, TransitionDelays};

fn default_namespace() -> String {
    "crewmute".to_string()
}

/// All configurable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Store key namespace prefix shared by every coordinating process.
    #[serde(default = "default_namespace")]
    namespace: String,

    // ============================================================================
    // Session storage
    // ============================================================================
    /// TTL applied uniformly to the canonical record and its pointers.
    session_ttl: Duration,
    /// Trailing window a connect code counts as live within.
    active_window: Duration,

    // ============================================================================
    // Queues
    // ============================================================================
    /// TTL set on a queue when its first element is enqueued.
    queue_ttl: Duration,
    /// Default bound for a blocking event-lane pop.
    event_pop_timeout: Duration,

    // ============================================================================
    // Locks & reads
    // ============================================================================
    lock_retry_step: Duration,
    lock_max_attempts: u32,
    read_retries: u32,
    read_retry_step: Duration,

    // ============================================================================
    // Voice rules
    // ============================================================================
    #[serde(default)]
    ruleset: RulesetKind,
    #[serde(default)]
    delays: TransitionDelays,

    // ============================================================================
    // Abuse guard
    // ============================================================================
    #[serde(default)]
    guard: GuardSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            session_ttl: Duration::from_secs(900),
            active_window: Duration::from_secs(900),
            queue_ttl: Duration::from_secs(3600),
            event_pop_timeout: Duration::from_secs(1),
            lock_retry_step: Duration::from_millis(50),
            lock_max_attempts: 10,
            read_retries: 10,
            read_retry_step: Duration::from_millis(50),
            ruleset: RulesetKind::default(),
            delays: TransitionDelays::default(),
            guard: GuardSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Read overrides from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(namespace) = std::env::var("CREWMUTE_NAMESPACE") {
            settings.namespace = namespace;
        }
        if let Some(ttl) = env_secs("CREWMUTE_SESSION_TTL_SECS") {
            settings.session_ttl = ttl;
        }
        if let Some(window) = env_secs("CREWMUTE_ACTIVE_WINDOW_SECS") {
            settings.active_window = window;
        }
        if let Some(ttl) = env_secs("CREWMUTE_QUEUE_TTL_SECS") {
            settings.queue_ttl = ttl;
        }
        if let Some(ruleset) = std::env::var("CREWMUTE_RULESET")
            .ok()
            .and_then(|raw| match raw.as_str() {
                "mute_and_deafen" => Some(RulesetKind::MuteAndDeafen),
                "mute_only" => Some(RulesetKind::MuteOnly),
                _ => None,
            })
        {
            settings.ruleset = ruleset;
        }
        settings
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn active_window(&self) -> Duration {
        self.active_window
    }

    pub fn queue_ttl(&self) -> Duration {
        self.queue_ttl
    }

    pub fn event_pop_timeout(&self) -> Duration {
        self.event_pop_timeout
    }

    pub fn lock_retry_step(&self) -> Duration {
        self.lock_retry_step
    }

    pub fn lock_max_attempts(&self) -> u32 {
        self.lock_max_attempts
    }

    pub fn read_retries(&self) -> u32 {
        self.read_retries
    }

    pub fn read_retry_step(&self) -> Duration {
        self.read_retry_step
    }

    pub fn ruleset(&self) -> RulesetKind {
        self.ruleset
    }

    pub fn delays(&self) -> &TransitionDelays {
        &self.delays
    }

    pub fn guard(&self) -> GuardSettings {
        self.guard
    }

    // ============================================================================
    // Builder-style setters (consume self)
    // ============================================================================

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self
        }
    }

    pub fn with_session_ttl(self, session_ttl: Duration) -> Self {
        Self {
            session_ttl,
            ..self
        }
    }

    pub fn with_queue_ttl(self, queue_ttl: Duration) -> Self {
        Self { queue_ttl, ..self }
    }

    pub fn with_event_pop_timeout(self, event_pop_timeout: Duration) -> Self {
        Self {
            event_pop_timeout,
            ..self
        }
    }

    pub fn with_lock_retry(self, step: Duration, max_attempts: u32) -> Self {
        Self {
            lock_retry_step: step,
            lock_max_attempts: max_attempts,
            ..self
        }
    }

    pub fn with_read_retry(self, step: Duration, retries: u32) -> Self {
        Self {
            read_retry_step: step,
            read_retries: retries,
            ..self
        }
    }

    pub fn with_ruleset(self, ruleset: RulesetKind) -> Self {
        Self { ruleset, ..self }
    }

    pub fn with_delays(self, delays: TransitionDelays) -> Self {
        Self { delays, ..self }
    }

    pub fn with_guard(self, guard: GuardSettings) -> Self {
        Self { guard, ..self }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
}
