//! Crewmute Engine - Distributed session coordination for bot shards.
//!
//! Capture agents and bot shards run as separate processes; the shared
//! store is their only coordination medium. This crate owns that medium's
//! client side:
//!
//! - `infrastructure/` - the store port and its in-memory adapter, the key
//!   namespace, TTL leases, the session directory/repository, job/event
//!   channels, and the rate-limit/abuse guard
//! - `use_cases/` - orchestration across those parts (tracking match
//!   events, starting sessions, dispatching jobs to capture agents)
//! - `app` - application composition
//!
//! Chat-platform SDK integration, persistent analytics, and the capture
//! pipeline itself are external collaborators reached through ports.

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;

/// End-to-end tests exercising the full pipeline on the in-memory store.
#[cfg(test)]
mod e2e_tests;
