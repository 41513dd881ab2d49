//! Consuming capture events: reconcile them into the session record and
//! hand voice decisions to the chat-platform collaborator.

use std::sync::Arc;

use crate::infrastructure::channels::{ChannelError, SessionChannel};
use crate::infrastructure::ports::VoiceControl;
use crate::infrastructure::session_repo::{RepoError, SessionRepository};
use crate::infrastructure::settings::EngineSettings;
use crewmute_domain::{
    ConnectCode, GamePhase, GuildId, PlayerUpdate, SessionRecord, TransitionDelays, UserId,
    VoiceRules, VoiceState,
};
use crewmute_shared::{
    ConnectionPayload, Envelope, GameOverPayload, LobbyPayload, MessageKind, ProtocolError,
    StatePayload,
};

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What one `execute` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// No event arrived within the pop timeout.
    Idle,
    /// An event was reconciled and written back.
    Updated { voice_refreshed: bool },
    /// The match ended and its session was deleted.
    Ended,
}

enum Step {
    Write { voice_refresh: bool },
    Ended,
}

/// Use case for the capture → bot direction: pop one event, reconcile it
/// into the session under its mutation lease, and emit voice decisions
/// for every linked, tracked user when the change warrants it.
pub struct TrackMatch {
    repo: Arc<SessionRepository>,
    events: Arc<SessionChannel>,
    voice: Arc<dyn VoiceControl>,
    rules: VoiceRules,
    delays: TransitionDelays,
}

impl TrackMatch {
    pub fn new(
        repo: Arc<SessionRepository>,
        events: Arc<SessionChannel>,
        voice: Arc<dyn VoiceControl>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            repo,
            events,
            voice,
            rules: settings.ruleset().rules(),
            delays: settings.delays().clone(),
        }
    }

    /// Pop and apply one capture event, bounded by the event lane's pop
    /// timeout. Intended to be driven in a loop by the shard.
    pub async fn execute(
        &self,
        guild: &GuildId,
        code: &ConnectCode,
    ) -> Result<TrackOutcome, TrackError> {
        let Some(envelope) = self.events.pop_wait(code, None).await? else {
            return Ok(TrackOutcome::Idle);
        };

        let mut record = self.repo.read_only(guild, code.as_str()).await?;
        let from_phase = record.game.phase();
        let lock = self.repo.lock(&record).await?;

        let step = match self.apply(&mut record, &envelope) {
            Ok(step) => step,
            Err(err) => {
                // the lease is released on every exit path
                self.repo.release(lock).await;
                return Err(err);
            }
        };

        match step {
            Step::Ended => {
                let result = self.repo.delete(&record).await;
                self.repo.release(lock).await;
                result?;
                tracing::info!(code = %code, "match over, session deleted");
                Ok(TrackOutcome::Ended)
            }
            Step::Write { voice_refresh } => {
                if voice_refresh {
                    self.refresh_voice(&mut record, from_phase).await;
                }
                self.repo.update_and_release(&record, Some(lock)).await?;
                Ok(TrackOutcome::Updated {
                    voice_refreshed: voice_refresh,
                })
            }
        }
    }

    fn apply(&self, record: &mut SessionRecord, envelope: &Envelope) -> Result<Step, TrackError> {
        match envelope.kind {
            MessageKind::Connection => {
                let payload: ConnectionPayload = envelope.decode()?;
                tracing::debug!(connected = payload.connected, "capture agent connection");
                Ok(Step::Write {
                    voice_refresh: false,
                })
            }
            MessageKind::Lobby => {
                let payload: LobbyPayload = envelope.decode()?;
                record.game.set_lobby(payload.room_code, payload.region);
                Ok(Step::Write {
                    voice_refresh: false,
                })
            }
            MessageKind::State => {
                let payload: StatePayload = envelope.decode()?;
                let changed = record.game.transition(payload.phase);
                Ok(Step::Write {
                    voice_refresh: changed,
                })
            }
            MessageKind::Player => {
                let update: PlayerUpdate = envelope.decode()?;
                let change = record.game.apply_player_update(&update);
                Ok(Step::Write {
                    voice_refresh: change.needs_voice_refresh(),
                })
            }
            MessageKind::GameOver => {
                let _payload: GameOverPayload = envelope.decode()?;
                Ok(Step::Ended)
            }
        }
    }

    /// Compute and emit voice decisions for every linked, tracked user.
    /// The anti-flap delay for this transition rides along; enacting it is
    /// the collaborator's job. A rejected update leaves the user flagged
    /// for a later pass.
    async fn refresh_voice(&self, record: &mut SessionRecord, from: GamePhase) {
        let phase = record.game.phase();
        let delay = self.delays.delay(from, phase);
        let guild = record.guild_id.clone();

        let decisions: Vec<(UserId, VoiceState)> = record
            .linked_users()
            .filter(|user| user.is_tracked())
            .map(|user| {
                // an update for this player may not have arrived yet; the
                // living default keeps them audible until it does
                let alive = user.roster_entry(&record.game).map_or(true, |e| e.alive);
                (user.user_id().clone(), self.rules.decide(alive, true, phase))
            })
            .collect();

        for (user_id, state) in decisions {
            let applied = self.voice.apply(&guild, &user_id, state, delay).await;
            if let Err(err) = &applied {
                tracing::warn!(user = %user_id, error = %err, "voice update rejected");
            }
            if let Some(user) = record.linked_user_mut(&user_id) {
                user.set_voice_pending(applied.is_err());
            }
        }
    }
}
