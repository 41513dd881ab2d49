//! Use cases - orchestration across the infrastructure parts.

pub mod dispatch_job;
pub mod start_session;
pub mod track_match;

pub use dispatch_job::{DispatchError, DispatchJob};
pub use start_session::{StartError, StartSession, StartResult};
pub use track_match::{TrackError, TrackMatch, TrackOutcome};
