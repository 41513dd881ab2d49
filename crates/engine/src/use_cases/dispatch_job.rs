//! Dispatching a job to a session's capture agent, with abuse guarding
//! and optional delivery confirmation.

use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::channels::{ChannelError, SessionChannel};
use crate::infrastructure::guard::AbuseGuard;
use crewmute_domain::{ConnectCode, UserId};
use crewmute_shared::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("actor is softbanned")]
    Banned,

    #[error("actor is rate limited")]
    RateLimited,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Use case for the bot → capture direction: guard the triggering actor,
/// then push the job and wait for the agent's acknowledgement.
pub struct DispatchJob {
    jobs: Arc<SessionChannel>,
    guard: Arc<AbuseGuard>,
}

impl DispatchJob {
    pub fn new(jobs: Arc<SessionChannel>, guard: Arc<AbuseGuard>) -> Self {
        Self { jobs, guard }
    }

    /// Returns whether the capture agent acknowledged within `ack_timeout`.
    pub async fn execute(
        &self,
        actor: &UserId,
        code: &ConnectCode,
        envelope: &Envelope,
        ack_timeout: Duration,
    ) -> Result<bool, DispatchError> {
        if self.guard.is_banned(actor).await {
            return Err(DispatchError::Banned);
        }
        if self.guard.is_on_cooldown(actor).await {
            let _ = self.guard.record_violation(actor).await;
            return Err(DispatchError::RateLimited);
        }
        self.guard.mark_general_cooldown(actor).await;

        Ok(self.jobs.push_acked(code, envelope, ack_timeout).await?)
    }
}
