//! Starting (or re-joining) a tracked session for a guild.

use std::sync::Arc;

use crate::infrastructure::guard::AbuseGuard;
use crate::infrastructure::keys::KeySpace;
use crate::infrastructure::locks::{LockManager, ACTOR_LEASE};
use crate::infrastructure::ports::Random;
use crate::infrastructure::session_repo::{RepoError, SessionRepository};
use crewmute_domain::{ChannelId, GuildId, SessionRecord, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("requester is softbanned")]
    Banned,

    #[error("requester is rate limited")]
    RateLimited,

    /// Another start for the same requester is in flight.
    #[error("another request for this actor is in flight")]
    Busy,

    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug)]
pub struct StartResult {
    pub record: SessionRecord,
    /// False when an existing session was joined instead.
    pub created: bool,
}

/// Use case for the "new match" flow: guard the requester, mint a connect
/// code, and get-or-create the session bound to the requested channels.
/// The whole flow runs under the requester's per-actor lease so two shards
/// handling the same command cannot both mint a session.
pub struct StartSession {
    repo: Arc<SessionRepository>,
    guard: Arc<AbuseGuard>,
    locks: Arc<LockManager>,
    keys: KeySpace,
    random: Arc<dyn Random>,
}

impl StartSession {
    pub fn new(
        repo: Arc<SessionRepository>,
        guard: Arc<AbuseGuard>,
        locks: Arc<LockManager>,
        keys: KeySpace,
        random: Arc<dyn Random>,
    ) -> Self {
        Self {
            repo,
            guard,
            locks,
            keys,
            random,
        }
    }

    pub async fn execute(
        &self,
        requester: &UserId,
        guild: &GuildId,
        text_channel: Option<ChannelId>,
        voice_channel: Option<ChannelId>,
    ) -> Result<StartResult, StartError> {
        if self.guard.is_banned(requester).await {
            return Err(StartError::Banned);
        }
        if self.guard.is_on_cooldown(requester).await {
            // hammering a guarded action while cooling down is a violation
            if self.guard.record_violation(requester).await {
                return Err(StartError::Banned);
            }
            return Err(StartError::RateLimited);
        }
        self.guard.mark_general_cooldown(requester).await;

        let lease = self
            .locks
            .acquire(&self.keys.user_lock(requester), ACTOR_LEASE)
            .await
            .map_err(RepoError::from)?
            .ok_or(StartError::Busy)?;

        let code = self.random.connect_code();
        let result = self
            .repo
            .get_or_create(guild, &code, text_channel, voice_channel)
            .await;
        if let Err(err) = self.locks.release(lease).await {
            tracing::warn!(error = %err, "failed to release actor lease");
        }

        let (record, created) = result?;
        Ok(StartResult { record, created })
    }
}
