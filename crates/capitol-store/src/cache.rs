//! Process-lifetime key/value cache with per-entry expiry.
//!
//! Entries are visible while `now - inserted_at <= ttl`. Expired entries are
//! evicted lazily by the lookup that finds them; nothing sweeps in the
//! background. There is no size bound: the cache lives for one process run.
//!
//! Values are stored behind [`Arc`] and handed out as shared read-only
//! snapshots. Writes replace whole entries, last write wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) <= self.ttl
    }
}

/// TTL cache keyed by query-parameter strings.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. An expired entry is removed and reported absent.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // A writer may have refreshed the entry between the two locks.
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key, "evicted expired cache entry");
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Arc<V> {
        self.set_shared(key, Arc::new(value), ttl)
    }

    /// Store an already-shared snapshot.
    pub fn set_shared(&self, key: impl Into<String>, value: Arc<V>, ttl: Duration) -> Arc<V> {
        let entry = CacheEntry {
            value: value.clone(),
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), entry);
        value
    }

    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .map(|e| e.value)
    }

    /// Stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
