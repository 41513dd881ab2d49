//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::channels::SessionChannel;
use crate::infrastructure::clock::{SystemClock, SystemRandom};
use crate::infrastructure::guard::AbuseGuard;
use crate::infrastructure::keys::KeySpace;
use crate::infrastructure::locks::LockManager;
use crate::infrastructure::ports::{Clock, Random, Store, VoiceControl};
use crate::infrastructure::session_repo::SessionRepository;
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::{DispatchJob, StartSession, TrackMatch};

/// Main application state for one bot shard.
///
/// Everything hangs off the shared store; the embedding process supplies
/// the store adapter and the voice-control collaborator.
pub struct App {
    pub settings: EngineSettings,
    pub repo: Arc<SessionRepository>,
    pub jobs: Arc<SessionChannel>,
    pub events: Arc<SessionChannel>,
    pub guard: Arc<AbuseGuard>,
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub track_match: Arc<TrackMatch>,
    pub start_session: Arc<StartSession>,
    pub dispatch_job: Arc<DispatchJob>,
}

impl App {
    /// Create an App with the system clock and system randomness.
    pub fn new(
        store: Arc<dyn Store>,
        voice: Arc<dyn VoiceControl>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_parts(
            store,
            voice,
            Arc::new(SystemClock::new()),
            Arc::new(SystemRandom::new()),
            settings,
        )
    }

    /// Create an App with every dependency injected (tests swap the clock
    /// and randomness here).
    pub fn with_parts(
        store: Arc<dyn Store>,
        voice: Arc<dyn VoiceControl>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn Random>,
        settings: EngineSettings,
    ) -> Self {
        let keys = KeySpace::new(settings.namespace());
        let locks = Arc::new(LockManager::new(
            Arc::clone(&store),
            settings.lock_retry_step(),
            settings.lock_max_attempts(),
        ));
        let repo = Arc::new(SessionRepository::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            keys.clone(),
            Arc::clone(&clock),
            &settings,
        ));
        let jobs = Arc::new(SessionChannel::jobs(
            Arc::clone(&store),
            keys.clone(),
            &settings,
        ));
        let events = Arc::new(SessionChannel::events(
            Arc::clone(&store),
            keys.clone(),
            &settings,
        ));
        let guard = Arc::new(AbuseGuard::new(
            Arc::clone(&store),
            keys.clone(),
            clock,
            settings.guard(),
        ));

        let use_cases = UseCases {
            track_match: Arc::new(TrackMatch::new(
                Arc::clone(&repo),
                Arc::clone(&events),
                voice,
                &settings,
            )),
            start_session: Arc::new(StartSession::new(
                Arc::clone(&repo),
                Arc::clone(&guard),
                locks,
                keys,
                random,
            )),
            dispatch_job: Arc::new(DispatchJob::new(Arc::clone(&jobs), Arc::clone(&guard))),
        };

        Self {
            settings,
            repo,
            jobs,
            events,
            guard,
            use_cases,
        }
    }
}
