//! Session directory and repository.
//!
//! Owns the canonical session record and its pointer keys. A record is
//! reachable by connect code, voice channel, or text channel; all three
//! pointers resolve to the same canonical key whenever the session is
//! readable, and every successful write refreshes the record and its
//! pointers with one uniform TTL so a pointer can never outlive its
//! target for long.

use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::keys::KeySpace;
use crate::infrastructure::locks::{LockGuard, LockManager, SESSION_LEASE};
use crate::infrastructure::ports::{Clock, Store, StoreError};
use crate::infrastructure::settings::EngineSettings;
use crewmute_domain::{ChannelId, ConnectCode, GuildId, SessionRecord};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The identifier resolves to nothing. Not fatal - callers create on
    /// demand or report "no session".
    #[error("no session found")]
    NotFound,

    /// Transient contention on the session's mutation lease. The session
    /// is busy, not absent; retry or abandon at a higher level.
    #[error("session lease not obtained")]
    LockNotObtained,

    /// Rejected before any mutation was attempted.
    #[error("invalid session record: {0}")]
    InvalidRecord(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct SessionRepository {
    store: Arc<dyn Store>,
    locks: Arc<LockManager>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    record_ttl: Duration,
    read_retries: u32,
    read_retry_step: Duration,
    active_window: Duration,
}

impl SessionRepository {
    pub fn new(
        store: Arc<dyn Store>,
        locks: Arc<LockManager>,
        keys: KeySpace,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            store,
            locks,
            keys,
            clock,
            record_ttl: settings.session_ttl(),
            read_retries: settings.read_retries(),
            read_retry_step: settings.read_retry_step(),
            active_window: settings.active_window(),
        }
    }

    /// Resolve any identifier to the canonical session key.
    ///
    /// Tries connect code, voice channel, then text channel; first match
    /// wins, so a session is never ambiguously reachable.
    pub async fn resolve(
        &self,
        guild: &GuildId,
        identifier: &str,
    ) -> Result<Option<String>, RepoError> {
        let pointers = [
            self.keys.code_pointer(guild, identifier),
            self.keys.voice_pointer(guild, identifier),
            self.keys.text_pointer(guild, identifier),
        ];
        for pointer in pointers {
            if let Some(canonical) = self.store.get(&pointer).await? {
                return Ok(Some(canonical));
            }
        }
        Ok(None)
    }

    /// Best-effort read without a lease.
    ///
    /// Retries a bounded number of times against transient misses; may
    /// observe a record mid-update, which callers tolerate. Never blocks
    /// on writers.
    pub async fn read_only(
        &self,
        guild: &GuildId,
        identifier: &str,
    ) -> Result<SessionRecord, RepoError> {
        for attempt in 0..self.read_retries.max(1) {
            if let Some(canonical) = self.resolve(guild, identifier).await? {
                if let Some(record) = self.read_at(&canonical).await? {
                    return Ok(record);
                }
            }
            if attempt + 1 < self.read_retries {
                tokio::time::sleep(self.read_retry_step).await;
            }
        }
        Err(RepoError::NotFound)
    }

    /// Fetch the session any pointer resolves to, or synthesize, persist,
    /// and index a fresh record. Returns the record and whether it was
    /// created.
    pub async fn get_or_create(
        &self,
        guild: &GuildId,
        code: &ConnectCode,
        text_channel: Option<ChannelId>,
        voice_channel: Option<ChannelId>,
    ) -> Result<(SessionRecord, bool), RepoError> {
        if code.is_empty() {
            return Err(RepoError::InvalidRecord("session has no connect code"));
        }
        if let Some(existing) = self
            .lookup(guild, code, text_channel.as_ref(), voice_channel.as_ref())
            .await?
        {
            return Ok((existing, false));
        }

        // create under the canonical key's mutation lease, re-checking
        // inside it so two shards cannot both synthesize the session
        let canonical = self.keys.game(guild, code);
        let lock = self.lock_canonical(&canonical).await?;
        match self.read_at(&canonical).await {
            Ok(Some(existing)) => {
                self.release(lock).await;
                return Ok((existing, false));
            }
            Ok(None) => {}
            Err(err) => {
                self.release(lock).await;
                return Err(err);
            }
        }

        let record = SessionRecord::new(
            guild.clone(),
            code.clone(),
            text_channel,
            voice_channel,
        );
        self.update_and_release(&record, Some(lock)).await?;
        Ok((record, true))
    }

    /// Acquire the record's short mutation lease.
    pub async fn lock(&self, record: &SessionRecord) -> Result<LockGuard, RepoError> {
        let canonical = self.keys.game(&record.guild_id, &record.connect_code);
        self.lock_canonical(&canonical).await
    }

    /// Release a lease outside the write path. Failures are logged; the
    /// TTL bounds the damage of a lost release.
    pub async fn release(&self, lock: LockGuard) {
        if let Err(err) = self.locks.release(lock).await {
            tracing::warn!(error = %err, "failed to release session lease");
        }
    }

    /// Serialize and write the record, refresh every pointer with the
    /// uniform TTL, then release the lease - on every exit path, including
    /// failures (a nil lease is a no-op release).
    pub async fn update_and_release(
        &self,
        record: &SessionRecord,
        lock: Option<LockGuard>,
    ) -> Result<(), RepoError> {
        let result = self.write_record(record).await;
        if let Some(guard) = lock {
            self.release(guard).await;
        }
        result
    }

    /// Remove all pointer keys and the canonical key. No-op when the
    /// record is already gone. Callers hold the record's lease.
    pub async fn delete(&self, record: &SessionRecord) -> Result<(), RepoError> {
        if record.connect_code.is_empty() {
            return Err(RepoError::InvalidRecord("session has no connect code"));
        }
        let guild = &record.guild_id;
        let _ = self
            .store
            .delete(&self.keys.code_pointer(guild, record.connect_code.as_str()))
            .await?;
        if let Some(voice) = &record.voice_channel {
            let _ = self
                .store
                .delete(&self.keys.voice_pointer(guild, voice.as_str()))
                .await?;
        }
        if let Some(text) = &record.text_channel {
            let _ = self
                .store
                .delete(&self.keys.text_pointer(guild, text.as_str()))
                .await?;
        }
        let _ = self
            .store
            .delete(&self.keys.game(guild, &record.connect_code))
            .await?;
        Ok(())
    }

    /// Live sessions within the trailing window. Degrades to zero when the
    /// store is unreachable.
    pub async fn count_live(&self) -> u64 {
        let now_ms = self.clock.now().timestamp_millis() as f64;
        let window_start = now_ms - self.active_window.as_millis() as f64;
        match self
            .store
            .scored_count(&self.keys.active_index(), window_start, f64::MAX)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "active-session count unavailable; reporting zero");
                0
            }
        }
    }

    /// Fire-and-forget trim of active-index entries older than the window.
    /// Failure is logged, never propagated.
    pub fn spawn_prune_stale(&self) {
        let store = Arc::clone(&self.store);
        let key = self.keys.active_index();
        let cutoff =
            self.clock.now().timestamp_millis() as f64 - self.active_window.as_millis() as f64;
        let _ = tokio::spawn(async move {
            match store.scored_remove_below(&key, cutoff).await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(removed, "pruned stale active-session entries");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "active-session prune failed"),
            }
        });
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn lock_canonical(&self, canonical: &str) -> Result<LockGuard, RepoError> {
        self.locks
            .acquire(&self.keys.lock(canonical), SESSION_LEASE)
            .await?
            .ok_or(RepoError::LockNotObtained)
    }

    /// Read and decode the record at a canonical key, refreshing its TTL.
    /// An undecodable record is logged and treated as absent - one corrupt
    /// blob must not take the shard down.
    async fn read_at(&self, canonical: &str) -> Result<Option<SessionRecord>, RepoError> {
        let Some(raw) = self.store.get(canonical).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => {
                self.refresh_ttls(&record, canonical).await;
                Ok(Some(record))
            }
            Err(err) => {
                tracing::warn!(key = canonical, error = %err, "undecodable session record treated as absent");
                Ok(None)
            }
        }
    }

    async fn write_record(&self, record: &SessionRecord) -> Result<(), RepoError> {
        if record.connect_code.is_empty() {
            return Err(RepoError::InvalidRecord("session has no connect code"));
        }
        let canonical = self.keys.game(&record.guild_id, &record.connect_code);
        let raw = serde_json::to_string(record)?;
        self.store.set(&canonical, &raw, self.record_ttl).await?;
        self.install_pointers(record, &canonical).await?;
        self.touch_active(&record.connect_code).await;
        Ok(())
    }

    async fn install_pointers(
        &self,
        record: &SessionRecord,
        canonical: &str,
    ) -> Result<(), StoreError> {
        let guild = &record.guild_id;
        self.store
            .set(
                &self.keys.code_pointer(guild, record.connect_code.as_str()),
                canonical,
                self.record_ttl,
            )
            .await?;
        if let Some(voice) = &record.voice_channel {
            self.store
                .set(
                    &self.keys.voice_pointer(guild, voice.as_str()),
                    canonical,
                    self.record_ttl,
                )
                .await?;
        }
        if let Some(text) = &record.text_channel {
            self.store
                .set(
                    &self.keys.text_pointer(guild, text.as_str()),
                    canonical,
                    self.record_ttl,
                )
                .await?;
        }
        Ok(())
    }

    /// Reads also extend the record's life; refresh is best-effort.
    async fn refresh_ttls(&self, record: &SessionRecord, canonical: &str) {
        if let Err(err) = self.store.expire(canonical, self.record_ttl).await {
            tracing::warn!(error = %err, "failed to refresh record TTL on read");
            return;
        }
        if let Err(err) = self.install_pointers(record, canonical).await {
            tracing::warn!(error = %err, "failed to refresh pointer TTLs on read");
        }
    }

    async fn touch_active(&self, code: &ConnectCode) {
        let score = self.clock.now().timestamp_millis() as f64;
        if let Err(err) = self
            .store
            .scored_insert(&self.keys.active_index(), score, code.as_str())
            .await
        {
            tracing::warn!(error = %err, "failed to touch active-session index");
        }
    }

    async fn lookup(
        &self,
        guild: &GuildId,
        code: &ConnectCode,
        text_channel: Option<&ChannelId>,
        voice_channel: Option<&ChannelId>,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let mut identifiers = vec![code.as_str()];
        if let Some(voice) = voice_channel {
            identifiers.push(voice.as_str());
        }
        if let Some(text) = text_channel {
            identifiers.push(text.as_str());
        }
        for identifier in identifiers {
            if let Some(canonical) = self.resolve(guild, identifier).await? {
                if let Some(record) = self.read_at(&canonical).await? {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        repo: SessionRepository,
        keys: KeySpace,
    }

    fn fixture() -> Fixture {
        let settings = EngineSettings::default()
            .with_namespace("cm")
            .with_lock_retry(Duration::from_millis(2), 3)
            .with_read_retry(Duration::from_millis(2), 3);
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(LockManager::new(
            Arc::clone(&store) as Arc<dyn Store>,
            settings.lock_retry_step(),
            settings.lock_max_attempts(),
        ));
        let keys = KeySpace::new(settings.namespace());
        let repo = SessionRepository::new(
            Arc::clone(&store) as Arc<dyn Store>,
            locks,
            keys.clone(),
            Arc::new(SystemClock::new()),
            &settings,
        );
        Fixture { store, repo, keys }
    }

    fn guild() -> GuildId {
        GuildId::new("G")
    }

    fn code() -> ConnectCode {
        ConnectCode::new("ABCDEFGH")
    }

    async fn create_full_session(fx: &Fixture) -> SessionRecord {
        let (record, created) = fx
            .repo
            .get_or_create(
                &guild(),
                &code(),
                Some(ChannelId::new("t1")),
                Some(ChannelId::new("v1")),
            )
            .await
            .expect("create");
        assert!(created);
        record
    }

    #[tokio::test]
    async fn every_pointer_resolves_to_the_same_canonical_key() {
        let fx = fixture();
        let _record = create_full_session(&fx).await;

        let canonical = fx.keys.game(&guild(), &code());
        for identifier in ["ABCDEFGH", "v1", "t1"] {
            assert_eq!(
                fx.repo
                    .resolve(&guild(), identifier)
                    .await
                    .expect("resolve"),
                Some(canonical.clone())
            );
        }
    }

    #[tokio::test]
    async fn ttls_are_uniform_after_a_write() {
        let fx = fixture();
        let _record = create_full_session(&fx).await;

        let keys = [
            fx.keys.game(&guild(), &code()),
            fx.keys.code_pointer(&guild(), "ABCDEFGH"),
            fx.keys.voice_pointer(&guild(), "v1"),
            fx.keys.text_pointer(&guild(), "t1"),
        ];
        let mut ttls = Vec::new();
        for key in keys {
            let ttl = fx
                .store
                .time_to_live(&key)
                .await
                .expect("store")
                .expect("key has a ttl");
            ttls.push(ttl);
        }
        let min = ttls.iter().min().expect("nonempty");
        let max = ttls.iter().max().expect("nonempty");
        assert!(*max - *min < Duration::from_secs(2), "ttls diverge: {ttls:?}");
        assert!(*max <= Duration::from_secs(900));
    }

    #[tokio::test]
    async fn get_or_create_returns_the_existing_record() {
        let fx = fixture();
        let first = create_full_session(&fx).await;

        let (second, created) = fx
            .repo
            .get_or_create(&guild(), &code(), None, None)
            .await
            .expect("second call");
        assert!(!created);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn read_only_misses_after_bounded_retries() {
        let fx = fixture();
        let err = fx
            .repo
            .read_only(&guild(), "missing")
            .await
            .expect_err("no session");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn empty_connect_code_is_rejected_before_mutation() {
        let fx = fixture();
        let record = SessionRecord::new(guild(), ConnectCode::new(""), None, None);
        let err = fx
            .repo
            .update_and_release(&record, None)
            .await
            .expect_err("invalid");
        assert!(matches!(err, RepoError::InvalidRecord(_)));
        let err = fx.repo.delete(&record).await.expect_err("invalid");
        assert!(matches!(err, RepoError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn a_failed_update_still_releases_the_lease() {
        let fx = fixture();
        let record = create_full_session(&fx).await;

        let lock = fx.repo.lock(&record).await.expect("lease");
        // force a failure inside the write while the lease is held
        let mut broken = record.clone();
        broken.connect_code = ConnectCode::new("");
        let err = fx
            .repo
            .update_and_release(&broken, Some(lock))
            .await
            .expect_err("invalid record");
        assert!(matches!(err, RepoError::InvalidRecord(_)));

        // the next holder succeeds immediately, without waiting out the TTL
        let lock = fx.repo.lock(&record).await.expect("lease free again");
        fx.repo.release(lock).await;
    }

    #[tokio::test]
    async fn a_held_lease_blocks_lock_and_reports_busy() {
        let fx = fixture();
        let record = create_full_session(&fx).await;

        let held = fx.repo.lock(&record).await.expect("lease");
        let err = fx.repo.lock(&record).await.expect_err("contended");
        assert!(matches!(err, RepoError::LockNotObtained));
        fx.repo.release(held).await;
    }

    #[tokio::test]
    async fn delete_removes_record_and_pointers() {
        let fx = fixture();
        let record = create_full_session(&fx).await;

        let lock = fx.repo.lock(&record).await.expect("lease");
        fx.repo.delete(&record).await.expect("delete");
        fx.repo.release(lock).await;

        assert_eq!(
            fx.repo.resolve(&guild(), "ABCDEFGH").await.expect("resolve"),
            None
        );
        assert_eq!(fx.repo.resolve(&guild(), "v1").await.expect("resolve"), None);
        assert_eq!(fx.repo.resolve(&guild(), "t1").await.expect("resolve"), None);
        assert!(matches!(
            fx.repo.read_only(&guild(), "ABCDEFGH").await,
            Err(RepoError::NotFound)
        ));

        // deleting again is a no-op
        fx.repo.delete(&record).await.expect("idempotent delete");
    }

    #[tokio::test]
    async fn corrupt_records_read_as_absent() {
        let fx = fixture();
        let record = create_full_session(&fx).await;
        let canonical = fx.keys.game(&guild(), &code());
        fx.store
            .set(&canonical, "{not json", Duration::from_secs(900))
            .await
            .expect("store");

        assert!(matches!(
            fx.repo.read_only(&guild(), "ABCDEFGH").await,
            Err(RepoError::NotFound)
        ));

        // get_or_create treats the corrupt blob as a miss and re-creates
        let (fresh, created) = fx
            .repo
            .get_or_create(
                &guild(),
                &code(),
                record.text_channel.clone(),
                record.voice_channel.clone(),
            )
            .await
            .expect("recreate");
        assert!(created);
        assert_eq!(fresh.connect_code, code());
    }

    #[tokio::test]
    async fn writes_mark_the_session_live() {
        let fx = fixture();
        assert_eq!(fx.repo.count_live().await, 0);
        let _record = create_full_session(&fx).await;
        assert_eq!(fx.repo.count_live().await, 1);
        fx.repo.spawn_prune_stale();
    }
}
