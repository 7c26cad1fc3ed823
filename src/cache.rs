//! TTL cache
//!
//! Explicit cache objects shared by the estimation components. Each entry records when it
//! was fetched; expired entries are treated as misses and replaced on the next insert.
//! Stale reads between expiry and refresh are acceptable.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A cached value plus its fetch time.
#[derive(Debug, Clone)]
pub struct CachedEntry<V> {
    pub value: V,
    /// Wall-clock time of the fetch, reported to callers
    pub fetched_at: DateTime<Utc>,
    inserted: Instant,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() >= ttl
    }
}

/// Thread-safe map with per-entry TTL.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CachedEntry<V>>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key` if present and not expired.
    pub async fn get_entry(&self, key: &K) -> Option<CachedEntry<V>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_expired(self.ttl))
            .cloned()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.get_entry(key).await.map(|e| e.value)
    }

    /// Stores `value`, returning the new entry.
    pub async fn insert(&self, key: K, value: V) -> CachedEntry<V> {
        let entry = CachedEntry {
            value,
            fetched_at: Utc::now(),
            inserted: Instant::now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key, entry.clone());
        entry
    }

    /// Drops expired entries.
    pub async fn purge_expired(&self) {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| !e.is_expired(ttl));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
