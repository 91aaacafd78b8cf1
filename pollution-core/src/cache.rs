//! In-memory key-value cache with per-entry expiry.
//!
//! Backed by `DashMap` so concurrent readers and independent writers never
//! contend on a global lock. Expired entries are dropped lazily on read and
//! in bulk by [`TtlCache::purge_expired`].

use dashmap::DashMap;
use std::{hash::Hash, sync::Arc, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    map: DashMap<K, Entry<V>>,
}

/// Shared handle injected into the components that read and write a cache.
pub type SharedCache<K, V> = Arc<TtlCache<K, V>>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub fn shared() -> SharedCache<K, V> {
        Arc::new(Self::new())
    }

    /// Returns a clone of the value if it has not expired yet.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.map.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        self.map.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.map.insert(key, Entry { value, expires_at });
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of stored entries, expired ones included until they are purged.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
