//! End-to-end flows over the in-memory store: one process plays both the
//! capture agent (pushing events) and the bot shard (consuming them).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::App;
use crate::infrastructure::clock::{FixedRandom, SystemClock};
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::ports::{Store, VoiceControl, VoiceError};
use crate::infrastructure::session_repo::RepoError;
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::TrackOutcome;
use crewmute_domain::{
    ChannelId, ConnectCode, GamePhase, GuildId, LinkedUser, PlayerAction, PlayerColor,
    PlayerUpdate, UserId, VoiceState,
};
use crewmute_shared::Envelope;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewmute_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Voice collaborator that records every applied state.
#[derive(Default)]
struct RecordingVoice {
    calls: Mutex<Vec<(UserId, VoiceState, Duration)>>,
}

impl RecordingVoice {
    fn calls_for(&self, user: &UserId) -> Vec<(VoiceState, Duration)> {
        self.calls
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|(id, _, _)| id == user)
            .map(|(_, state, delay)| (*state, *delay))
            .collect()
    }
}

#[async_trait]
impl VoiceControl for RecordingVoice {
    async fn apply(
        &self,
        _guild: &GuildId,
        user: &UserId,
        state: VoiceState,
        delay: Duration,
    ) -> Result<(), VoiceError> {
        self.calls
            .lock()
            .expect("poisoned")
            .push((user.clone(), state, delay));
        Ok(())
    }
}

fn test_app(voice: Arc<RecordingVoice>) -> App {
    let settings = EngineSettings::default()
        .with_namespace("cm")
        .with_lock_retry(Duration::from_millis(2), 5)
        .with_read_retry(Duration::from_millis(2), 3)
        .with_event_pop_timeout(Duration::from_millis(50));
    App::with_parts(
        Arc::new(MemoryStore::new()) as Arc<dyn Store>,
        voice,
        Arc::new(SystemClock::new()),
        Arc::new(FixedRandom(ConnectCode::new("ABCDEFGH"))),
        settings,
    )
}

#[tokio::test]
async fn full_match_flow() -> anyhow::Result<()> {
    init_tracing();
    let voice = Arc::new(RecordingVoice::default());
    let app = test_app(Arc::clone(&voice));
    let guild = GuildId::new("G");
    let code = ConnectCode::new("ABCDEFGH");
    let requester = UserId::new("1001");

    // the "new match" command creates the session bound to both channels
    let started = app
        .use_cases
        .start_session
        .execute(
            &requester,
            &guild,
            Some(ChannelId::new("t1")),
            Some(ChannelId::new("v1")),
        )
        .await?;
    assert!(started.created);
    assert_eq!(started.record.connect_code, code);
    assert_eq!(app.repo.count_live().await, 1);

    // the requester links themselves to the in-game player "Red"
    let mut record = started.record;
    let mut user = LinkedUser::new(requester.clone(), "red_main");
    user.link("Red");
    record.link_user(user);
    let lock = app.repo.lock(&record).await?;
    app.repo.update_and_release(&record, Some(lock)).await?;

    // capture agent reports: lobby found, then the match starts
    for envelope in [
        Envelope::connection(true).expect("encode"),
        Envelope::lobby("QWXYZA", "eu-west").expect("encode"),
        Envelope::state(GamePhase::Lobby).expect("encode"),
        Envelope::state(GamePhase::Playing).expect("encode"),
    ] {
        app.events.push(&code, &envelope).await?;
    }
    for expected in [
        TrackOutcome::Updated {
            voice_refreshed: false,
        },
        TrackOutcome::Updated {
            voice_refreshed: false,
        },
        TrackOutcome::Updated {
            voice_refreshed: true,
        },
        TrackOutcome::Updated {
            voice_refreshed: true,
        },
    ] {
        let outcome = app
            .use_cases
            .track_match
            .execute(&guild, &code)
            .await?;
        assert_eq!(outcome, expected);
    }

    // a player event reconciles into the roster as an insert
    let update = PlayerUpdate {
        color: PlayerColor::Red,
        name: "Red".to_string(),
        dead: false,
        action: PlayerAction::Joined,
        disconnected: false,
    };
    app.events
        .push(&code, &Envelope::player(&update)?)
        .await?;
    let outcome = app.use_cases.track_match.execute(&guild, &code).await?;
    assert_eq!(
        outcome,
        TrackOutcome::Updated {
            voice_refreshed: true
        }
    );

    // session state: reachable by every identifier, roster reconciled
    let read = app.repo.read_only(&guild, "v1").await?;
    assert_eq!(read.game.phase(), GamePhase::Playing);
    assert_eq!(read.game.room_code(), Some("QWXYZA"));
    assert!(read.game.roster_entry("Red").expect("entry").alive);

    // under the mute+deafen ruleset, a living linked player is muted but
    // not deafened during active play
    let calls = voice.calls_for(&requester);
    let (last_state, _) = calls.last().expect("voice was driven");
    assert_eq!(
        *last_state,
        VoiceState {
            mute: true,
            deafen: false
        }
    );
    // entering play from the lobby rode the anti-flap delay
    assert!(calls.iter().any(|(_, delay)| *delay == Duration::from_millis(7_000)));

    // game over tears the session down
    app.events.push(&code, &Envelope::game_over()?).await?;
    let outcome = app.use_cases.track_match.execute(&guild, &code).await?;
    assert_eq!(outcome, TrackOutcome::Ended);
    assert!(matches!(
        app.repo.read_only(&guild, code.as_str()).await,
        Err(RepoError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn job_dispatch_reaches_a_listening_agent() -> anyhow::Result<()> {
    init_tracing();
    let voice = Arc::new(RecordingVoice::default());
    let app = test_app(Arc::clone(&voice));
    let code = ConnectCode::new("ABCDEFGH");

    // capture agent side: wake on notify, pop the job, acknowledge
    let agent_jobs = Arc::clone(&app.jobs);
    let agent_code = code.clone();
    let mut notify = app.jobs.subscribe_notify(&code).await?;
    let agent = tokio::spawn(async move {
        if notify.recv(Duration::from_secs(2)).await.is_none() {
            return None;
        }
        let job = agent_jobs.pop(&agent_code).await.ok().flatten();
        let _ = agent_jobs.ack(&agent_code).await;
        job
    });

    let acked = app
        .use_cases
        .dispatch_job
        .execute(
            &UserId::new("1001"),
            &code,
            &Envelope::connection(true)?,
            Duration::from_secs(2),
        )
        .await?;
    assert!(acked);

    let delivered = agent.await?.expect("job delivered");
    assert_eq!(delivered.kind, crewmute_shared::MessageKind::Connection);
    Ok(())
}
