//! In-memory TTL cache for upstream responses.
//!
//! Entries are opaque JSON values, each stored with its own time to live.
//! Expired entries are never returned. Moka drops them lazily and in bulk
//! on [`TtlCache::purge_expired`].

use moka::Expiry;
use moka::sync::Cache;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry {
    payload: Value,
    ttl: Duration,
}

/// Expires every entry after the TTL it was last written with.
struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct TtlCache {
    inner: Cache<String, CachedEntry>,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }

    pub fn set(&self, key: impl Into<String>, payload: Value, ttl: Duration) {
        self.inner.insert(key.into(), CachedEntry { payload, ttl });
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|entry| entry.payload)
    }

    /// Runs moka's pending maintenance, which evicts expired entries.
    /// Returns roughly how many entries went away.
    pub fn purge_expired(&self) -> u64 {
        let before = self.inner.entry_count();
        self.inner.run_pending_tasks();
        before.saturating_sub(self.inner.entry_count())
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
