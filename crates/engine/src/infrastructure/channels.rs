//! Per-session ordered message lanes between bot shards and capture
//! agents.
//!
//! Two lanes share one protocol: `jobs` (bot → capture, task assignment)
//! and `events` (capture → bot, state reporting). Delivery is strict FIFO
//! within a session and at-most-once from the queue's perspective - a
//! popped envelope is gone whether or not the consumer handles it, and
//! any retry is the consumer's business. The first element enqueued arms
//! the queue's TTL so an abandoned session's backlog is reclaimed.

use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::keys::{KeySpace, Lane};
use crate::infrastructure::ports::{Store, StoreError, Subscription};
use crate::infrastructure::settings::EngineSettings;
use crewmute_domain::ConnectCode;
use crewmute_shared::{Envelope, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The envelope (or its payload) failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub struct SessionChannel {
    store: Arc<dyn Store>,
    keys: KeySpace,
    lane: Lane,
    queue_ttl: Duration,
    default_pop_timeout: Duration,
}

impl SessionChannel {
    /// Bot → capture lane. Pushes signal the notify topic so idle capture
    /// agents wake without polling; pops are non-blocking.
    pub fn jobs(store: Arc<dyn Store>, keys: KeySpace, settings: &EngineSettings) -> Self {
        Self {
            store,
            keys,
            lane: Lane::Jobs,
            queue_ttl: settings.queue_ttl(),
            default_pop_timeout: settings.event_pop_timeout(),
        }
    }

    /// Capture → bot lane. Pops block up to a bounded timeout so a
    /// consumer can interleave waiting with other work.
    pub fn events(store: Arc<dyn Store>, keys: KeySpace, settings: &EngineSettings) -> Self {
        Self {
            store,
            keys,
            lane: Lane::Events,
            queue_ttl: settings.queue_ttl(),
            default_pop_timeout: settings.event_pop_timeout(),
        }
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Append to the tail of the session's queue.
    pub async fn push(&self, code: &ConnectCode, envelope: &Envelope) -> Result<(), ChannelError> {
        let raw = envelope.to_wire()?;
        let key = self.keys.queue(self.lane, code);
        let len = self.store.push_back(&key, &raw).await?;
        if len == 1 {
            // first element arms the queue's reclamation TTL
            let _ = self.store.expire(&key, self.queue_ttl).await?;
        }
        if self.lane == Lane::Jobs {
            let topic = self.keys.queue_notify(self.lane, code);
            let _ = self
                .store
                .publish(&topic, envelope.kind.to_string().as_bytes())
                .await?;
        }
        Ok(())
    }

    /// Non-blocking pop of the head element.
    pub async fn pop(&self, code: &ConnectCode) -> Result<Option<Envelope>, ChannelError> {
        let key = self.keys.queue(self.lane, code);
        match self.store.pop_front(&key).await? {
            Some(raw) => Ok(Some(Envelope::from_wire(&raw)?)),
            None => Ok(None),
        }
    }

    /// Blocking pop bounded by `timeout` (the configured default when
    /// `None`). Times out to `Ok(None)`, never an error.
    pub async fn pop_wait(
        &self,
        code: &ConnectCode,
        timeout: Option<Duration>,
    ) -> Result<Option<Envelope>, ChannelError> {
        let key = self.keys.queue(self.lane, code);
        let timeout = timeout.unwrap_or(self.default_pop_timeout);
        match self.store.pop_front_wait(&key, timeout).await? {
            Some(raw) => Ok(Some(Envelope::from_wire(&raw)?)),
            None => Ok(None),
        }
    }

    /// Publish a one-shot acknowledgement on the session's ack topic.
    pub async fn ack(&self, code: &ConnectCode) -> Result<(), ChannelError> {
        let topic = self.keys.queue_ack(self.lane, code);
        let _ = self.store.publish(&topic, b"ack").await?;
        Ok(())
    }

    /// Subscribe to acknowledgements. A producer that needs confirmation
    /// subscribes *before* pushing.
    pub async fn subscribe_ack(&self, code: &ConnectCode) -> Result<Subscription, ChannelError> {
        Ok(self
            .store
            .subscribe(&self.keys.queue_ack(self.lane, code))
            .await?)
    }

    /// Subscribe to the wake-up topic pushes on the jobs lane signal.
    pub async fn subscribe_notify(&self, code: &ConnectCode) -> Result<Subscription, ChannelError> {
        Ok(self
            .store
            .subscribe(&self.keys.queue_notify(self.lane, code))
            .await?)
    }

    /// Subscribe, push, and wait for the consumer's acknowledgement.
    /// Returns whether the ack arrived within `timeout`.
    pub async fn push_acked(
        &self,
        code: &ConnectCode,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<bool, ChannelError> {
        let mut acks = self.subscribe_ack(code).await?;
        self.push(code, envelope).await?;
        Ok(acks.recv(timeout).await.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;
    use crewmute_domain::GamePhase;

    struct Fixture {
        store: Arc<MemoryStore>,
        jobs: SessionChannel,
        events: SessionChannel,
        keys: KeySpace,
    }

    fn fixture() -> Fixture {
        let settings = EngineSettings::default().with_namespace("cm");
        let store = Arc::new(MemoryStore::new());
        let keys = KeySpace::new(settings.namespace());
        let jobs = SessionChannel::jobs(
            Arc::clone(&store) as Arc<dyn Store>,
            keys.clone(),
            &settings,
        );
        let events = SessionChannel::events(
            Arc::clone(&store) as Arc<dyn Store>,
            keys.clone(),
            &settings,
        );
        Fixture {
            store,
            jobs,
            events,
            keys,
        }
    }

    fn code() -> ConnectCode {
        ConnectCode::new("ABCDEFGH")
    }

    #[tokio::test]
    async fn jobs_are_fifo_within_a_session() {
        let fx = fixture();
        let messages = [
            Envelope::connection(true).expect("encode"),
            Envelope::state(GamePhase::Lobby).expect("encode"),
            Envelope::state(GamePhase::Playing).expect("encode"),
        ];
        for message in &messages {
            fx.jobs.push(&code(), message).await.expect("push");
        }

        for expected in &messages {
            let popped = fx.jobs.pop(&code()).await.expect("pop").expect("present");
            assert_eq!(&popped, expected);
        }
    }

    #[tokio::test]
    async fn sessions_do_not_interfere() {
        let fx = fixture();
        let other = ConnectCode::new("ZZZZZZZZ");
        fx.jobs
            .push(&code(), &Envelope::connection(true).expect("encode"))
            .await
            .expect("push");

        assert_eq!(fx.jobs.pop(&other).await.expect("pop"), None);
        assert!(fx.jobs.pop(&code()).await.expect("pop").is_some());
    }

    #[tokio::test]
    async fn popping_an_empty_queue_is_not_an_error() {
        let fx = fixture();
        assert_eq!(fx.jobs.pop(&code()).await.expect("pop"), None);
        assert_eq!(
            fx.events
                .pop_wait(&code(), Some(Duration::from_millis(20)))
                .await
                .expect("pop"),
            None
        );
    }

    #[tokio::test]
    async fn first_push_arms_the_queue_ttl() {
        let fx = fixture();
        fx.events
            .push(&code(), &Envelope::connection(true).expect("encode"))
            .await
            .expect("push");

        let ttl = fx
            .store
            .time_to_live(&fx.keys.queue(Lane::Events, &code()))
            .await
            .expect("store")
            .expect("queue has a ttl");
        assert!(ttl <= Duration::from_secs(3600));
        assert!(ttl > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn job_pushes_signal_the_notify_topic() {
        let fx = fixture();
        let mut notify = fx.jobs.subscribe_notify(&code()).await.expect("subscribe");
        fx.jobs
            .push(&code(), &Envelope::game_over().expect("encode"))
            .await
            .expect("push");

        let signal = notify
            .recv(Duration::from_millis(200))
            .await
            .expect("signal");
        assert_eq!(signal, b"game_over".to_vec());
    }

    #[tokio::test]
    async fn event_pushes_do_not_signal() {
        let fx = fixture();
        let mut notify = fx
            .events
            .subscribe_notify(&code())
            .await
            .expect("subscribe");
        fx.events
            .push(&code(), &Envelope::connection(true).expect("encode"))
            .await
            .expect("push");
        assert_eq!(notify.recv(Duration::from_millis(20)).await, None);
    }

    #[tokio::test]
    async fn event_pop_wait_sees_a_concurrent_push() {
        let fx = fixture();
        let store = Arc::clone(&fx.store);
        let keys = fx.keys.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let producer = SessionChannel::events(
                store as Arc<dyn Store>,
                keys,
                &EngineSettings::default().with_namespace("cm"),
            );
            let _ = producer
                .push(&code(), &Envelope::state(GamePhase::Discussion).expect("encode"))
                .await;
        });

        let popped = fx
            .events
            .pop_wait(&code(), Some(Duration::from_secs(2)))
            .await
            .expect("pop")
            .expect("pushed");
        assert_eq!(popped.kind, crewmute_shared::MessageKind::State);
    }

    #[tokio::test]
    async fn push_acked_round_trip() {
        let fx = fixture();
        let consumer_store = Arc::clone(&fx.store);
        let keys = fx.keys.clone();
        tokio::spawn(async move {
            let consumer = SessionChannel::jobs(
                consumer_store as Arc<dyn Store>,
                keys,
                &EngineSettings::default().with_namespace("cm"),
            );
            // wait for the job, process it, acknowledge
            for _ in 0..50 {
                if consumer.pop(&code()).await.ok().flatten().is_some() {
                    let _ = consumer.ack(&code()).await;
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let acked = fx
            .jobs
            .push_acked(
                &code(),
                &Envelope::connection(true).expect("encode"),
                Duration::from_secs(2),
            )
            .await
            .expect("push");
        assert!(acked);
    }

    #[tokio::test]
    async fn push_acked_times_out_without_a_consumer() {
        let fx = fixture();
        let acked = fx
            .jobs
            .push_acked(
                &code(),
                &Envelope::connection(true).expect("encode"),
                Duration::from_millis(30),
            )
            .await
            .expect("push");
        assert!(!acked);
    }
}
