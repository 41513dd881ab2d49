//! The store key namespace.
//!
//! These exact strings are a contract: capture agents, bot shards, and any
//! operational tooling address the same keys. Change one and every other
//! process goes blind. The unit tests below pin the full table.

use crewmute_domain::{ConnectCode, GuildId, UserId};

/// Which queue lane a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Bot → capture task assignment.
    Jobs,
    /// Capture → bot state reporting.
    Events,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Events => "events",
        }
    }
}

/// Renders every key the engine touches under one namespace prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Canonical session record.
    pub fn game(&self, guild: &GuildId, code: &ConnectCode) -> String {
        format!("{}:game:{}:{}", self.namespace, guild, code)
    }

    /// Pointer: connect-code → canonical.
    pub fn code_pointer(&self, guild: &GuildId, code: &str) -> String {
        format!("{}:ptr:code:{}:{}", self.namespace, guild, code)
    }

    /// Pointer: voice-channel → canonical.
    pub fn voice_pointer(&self, guild: &GuildId, channel: &str) -> String {
        format!("{}:ptr:voice:{}:{}", self.namespace, guild, channel)
    }

    /// Pointer: text-channel → canonical.
    pub fn text_pointer(&self, guild: &GuildId, channel: &str) -> String {
        format!("{}:ptr:text:{}:{}", self.namespace, guild, channel)
    }

    /// Mutation lease over any canonical key.
    pub fn lock(&self, canonical: &str) -> String {
        format!("{canonical}:lock")
    }

    /// Per-actor lease, serializing operations keyed by a chat identity.
    pub fn user_lock(&self, actor: &UserId) -> String {
        format!("{}:lock:user:{}", self.namespace, actor)
    }

    /// Per-credential lease, serializing identify/handshake attempts on a
    /// shared worker credential.
    pub fn credential_lock(&self, credential_hash: &str) -> String {
        format!("{}:lock:credential:{}", self.namespace, credential_hash)
    }

    /// Per-session queue for a lane.
    pub fn queue(&self, lane: Lane, code: &ConnectCode) -> String {
        format!("{}:{}:{}", self.namespace, lane.as_str(), code)
    }

    /// Wake-up topic for a lane's queue.
    pub fn queue_notify(&self, lane: Lane, code: &ConnectCode) -> String {
        format!("{}:notify", self.queue(lane, code))
    }

    /// One-shot acknowledgement topic for a lane's queue.
    pub fn queue_ack(&self, lane: Lane, code: &ConnectCode) -> String {
        format!("{}:ack", self.queue(lane, code))
    }

    /// Time-ordered set of live connect codes.
    pub fn active_index(&self) -> String {
        format!("{}:active", self.namespace)
    }

    /// Per-actor general cooldown marker.
    pub fn general_cooldown(&self, actor: &UserId) -> String {
        format!("{}:ratelimit:actor:{}", self.namespace, actor)
    }

    /// Per-actor, per-action cooldown marker.
    pub fn action_cooldown(&self, actor: &UserId, action: &str) -> String {
        format!("{}:ratelimit:actor:{}:{}", self.namespace, action, actor)
    }

    /// Sliding-window violation log.
    pub fn softban_log(&self, actor: &UserId) -> String {
        format!("{}:softban:log:{}", self.namespace, actor)
    }

    /// Softban marker.
    pub fn softban(&self, actor: &UserId) -> String {
        format!("{}:softban:{}", self.namespace, actor)
    }

    /// Per-(guild, credential) usage counter.
    pub fn credential_throttle(&self, guild: &GuildId, credential_hash: &str) -> String {
        format!("{}:throttle:{}:{}", self.namespace, guild, credential_hash)
    }
}
