//! Replay guard for consumed AuthnRequest IDs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Records AuthnRequest IDs as they are consumed. Backed in-process by
/// [`MemoryReplayGuard`]; multi-instance deployments plug in a shared store.
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Atomically records `request_id` as consumed for `retention`. Returns
    /// `false` if it was already consumed and has not yet been evicted.
    async fn consume(&self, request_id: &str, retention: Duration) -> bool;
}

#[derive(Clone, Default)]
pub struct MemoryReplayGuard {
    inner: Arc<DashMap<String, DateTime<Utc>>>,
}

impl MemoryReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn consume_at(&self, request_id: &str, retention: Duration, now: DateTime<Utc>) -> bool {
        let evict_at = now + retention;
        match self.inner.entry(request_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return false;
                }
                entry.insert(evict_at);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(evict_at);
                true
            }
        }
    }

    fn cleanup_expired(&self, now: DateTime<Utc>) {
        self.inner.retain(|_, evict_at| *evict_at > now);
    }
}

#[async_trait]
impl ReplayGuard for MemoryReplayGuard {
    async fn consume(&self, request_id: &str, retention: Duration) -> bool {
        self.consume_at(request_id, retention, Utc::now())
    }
}

pub async fn replay_cleanup_task(guard: MemoryReplayGuard) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        let before = guard.len();
        guard.cleanup_expired(Utc::now());
        let removed = before.saturating_sub(guard.len());
        if removed > 0 {
            tracing::info!(removed, "evicted expired replay entries");
        }
    }
}
