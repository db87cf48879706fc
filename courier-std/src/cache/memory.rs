//! In-process cache provider.

use courier_core::{BoxError, CacheProvider, CacheValue};
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: CacheValue,
    expires_at: Instant,
}

/// A concurrent in-memory TTL store.
///
/// Entries carry an absolute expiry. Expired entries are dropped when a
/// lookup finds them, or in bulk by [`MemoryCache::purge_expired`].
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store an entry that expires after `ttl`.
    pub fn insert(&self, key: impl Into<String>, value: CacheValue, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    /// Remove an entry.
    pub fn remove(&self, key: &str) -> Option<CacheValue> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Returns `true` if a live entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// The number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl CacheProvider for MemoryCache {
    async fn try_get(&self, key: &str) -> Result<Option<CacheValue>, BoxError> {
        Ok(self.get(key))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<(), BoxError> {
        self.insert(key, value, ttl);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
