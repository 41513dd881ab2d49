//! In-memory store adapter for development and testing.
//!
//! Single-process stand-in for the shared store: TTL'd keys with lazy
//! expiry (entries are treated as gone once past their deadline but only
//! removed when touched or swept), notify-backed blocking pops, and
//! process-local pub/sub fan-out. Multi-process deployments put a
//! networked adapter behind the same [`Store`] trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, Notify, RwLock};

use crate::infrastructure::ports::{Store, StoreError, Subscription};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Count(i64),
    List(VecDeque<String>),
    Scored(Vec<(f64, String)>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Process-local [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    /// Wakers for blocked queue pops, one per list key.
    queue_wakers: DashMap<String, Arc<Notify>>,
    /// Live subscribers per topic; dead senders are pruned on publish.
    topics: DashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry; returns the count removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    fn waker(&self, key: &str) -> Arc<Notify> {
        self.queue_wakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

/// Drop the entry if it has expired, then hand back a live mutable borrow.
fn live_mut<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(Entry::is_expired) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        let value = entries
            .get(key)
            .filter(|e| !e.is_expired())
            .and_then(|e| match &e.value {
                Value::Text(text) => Some(text.clone()),
                Value::Count(count) => Some(count.to_string()),
                Value::List(_) | Value::Scored(_) => None,
            });
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        if live_mut(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let existed = live_mut(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let matched = match live_mut(&mut entries, key) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => text.as_str() == expected,
            _ => false,
        };
        if matched {
            entries.remove(key);
        }
        Ok(matched)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).map_or(false, |e| !e.is_expired()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        match live_mut(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now())))
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Count(0),
            expires_at: None,
        });
        let next = match &entry.value {
            Value::Count(count) => count + 1,
            // an explicit overwrite (e.g. a blackout marker) keeps counting from its value
            Value::Text(text) => text.parse::<i64>().unwrap_or(0) + 1,
            Value::List(_) | Value::Scored(_) => 1,
        };
        entry.value = Value::Count(next);
        Ok(next)
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len = {
            let mut entries = self.entries.write().await;
            if entries.get(key).is_some_and(Entry::is_expired) {
                entries.remove(key);
            }
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::List(list) => {
                    list.push_back(value.to_string());
                    list.len() as u64
                }
                other => {
                    *other = Value::List(VecDeque::from([value.to_string()]));
                    1
                }
            }
        };
        // store a wake permit even if no consumer is parked yet
        self.waker(key).notify_one();
        Ok(len)
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = live_mut(&mut entries, key) else {
            return Ok(None);
        };
        let Value::List(list) = &mut entry.value else {
            return Ok(None);
        };
        let popped = list.pop_front();
        if list.is_empty() {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn pop_front_wait(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.pop_front(key).await? {
                return Ok(Some(value));
            }
            let notify = self.waker(key);
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if tokio::time::timeout(deadline - now, notify.notified())
                .await
                .is_err()
            {
                // timed out waiting; one final non-blocking look
                return self.pop_front(key).await;
            }
        }
    }

    async fn scored_insert(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Scored(Vec::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Scored(members) => {
                members.retain(|(_, m)| m != member);
                members.push((score, member.to_string()));
            }
            other => *other = Value::Scored(vec![(score, member.to_string())]),
        }
        Ok(())
    }

    async fn scored_count(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError> {
        let entries = self.entries.read().await;
        let count = entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map_or(0, |e| match &e.value {
                Value::Scored(members) => members
                    .iter()
                    .filter(|(score, _)| *score >= min && *score <= max)
                    .count() as u64,
                _ => 0,
            });
        Ok(count)
    }

    async fn scored_remove_below(&self, key: &str, cutoff: f64) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = live_mut(&mut entries, key) else {
            return Ok(0);
        };
        let Value::Scored(members) = &mut entry.value else {
            return Ok(0);
        };
        let before = members.len();
        members.retain(|(score, _)| *score >= cutoff);
        let removed = (before - members.len()) as u64;
        if members.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<usize, StoreError> {
        let mut delivered = 0;
        if let Some(mut senders) = self.topics.get_mut(topic) {
            senders.retain(|tx| {
                if tx.send(payload.to_vec()).is_ok() {
                    delivered += 1;
                    true
                } else {
                    false
                }
            });
        }
        Ok(delivered)
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics.entry(topic.to_string()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }
}
