//! Crewmute Shared - Wire protocol between capture agents and bot shards.
//!
//! This crate contains the message envelope and typed payloads that travel
//! over the per-session job and event queues. Both processes depend on it;
//! nothing else does.
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, serde_json, thiserror, and the
//!    domain vocabulary types only
//! 2. **No business logic** - pure data types and (de)serialization
//! 3. **Closed message set** - unknown kinds fail at the envelope layer,
//!    unknown payload contents for a known kind fail as decode errors

pub mod messages;

pub use messages::{
    ConnectionPayload, Envelope, GameOverPayload, LobbyPayload, MessageKind, ProtocolError,
    StatePayload,
};
