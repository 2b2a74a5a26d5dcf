//! In-process counter cache.
//!
//! Mirrors counter entries for low-latency lookups. Scoped to one process;
//! the counter store is the only cross-instance source of truth.

use dashmap::DashMap;
use thiserror::Error;

use crate::metrics::CacheMetrics;

use super::entry::RateLimitEntry;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Cache of counter entries keyed by counter key.
///
/// Errors are reported rather than panicking so the service can fail open.
pub trait CounterCache: Send + Sync {
    /// Live entry for `key`; expired entries are evicted and reported absent.
    fn get(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, CacheError>;

    fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), CacheError>;

    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Evict every expired entry, returning how many were removed.
    fn sweep(&self, now: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `DashMap`-backed cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterCache for MemoryCache {
    fn get(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, CacheError> {
        // Copy out before touching the map again; holding a shard guard
        // across `remove` would deadlock.
        let entry = self.entries.get(key).map(|e| *e);

        match entry {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry)),
            Some(_) => {
                if self
                    .entries
                    .remove_if(key, |_, current| current.is_expired(now))
                    .is_some()
                {
                    CacheMetrics::set_entries(self.entries.len());
                }
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), CacheError> {
        if self.entries.insert(key.to_string(), entry).is_none() {
            CacheMetrics::set_entries(self.entries.len());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.entries.remove(key).is_some() {
            CacheMetrics::set_entries(self.entries.len());
        }
        Ok(())
    }

    fn sweep(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

        CacheMetrics::set_entries(self.entries.len());
        if removed > 0 {
            CacheMetrics::record_swept(removed);
            tracing::debug!(
                removed = removed,
                remaining = self.entries.len(),
                "Swept expired rate limit cache entries"
            );
        }

        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_live_entry() {
        let cache = MemoryCache::new();
        let entry = RateLimitEntry::start(1_000, 60_000);
        cache.set("k", entry).unwrap();

        assert_eq!(cache.get("k", 2_000).unwrap(), Some(entry));
        assert_eq!(cache.get("k", 61_000).unwrap(), Some(entry));
    }

    #[test]
    fn test_get_evicts_expired_entry() {
        let cache = MemoryCache::new();
        cache.set("k", RateLimitEntry::start(0, 1_000)).unwrap();

        assert_eq!(cache.get("k", 1_001).unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites_and_delete_removes() {
        let cache = MemoryCache::new();
        let mut entry = RateLimitEntry::start(0, 10_000);
        cache.set("k", entry).unwrap();
        entry.record_hit();
        cache.set("k", entry).unwrap();

        assert_eq!(cache.get("k", 5).unwrap().map(|e| e.count), Some(2));
        assert_eq!(cache.len(), 1);

        cache.delete("k").unwrap();
        assert_eq!(cache.get("k", 5).unwrap(), None);
        cache.delete("missing").unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = MemoryCache::new();
        cache.set("old-1", RateLimitEntry::start(0, 100)).unwrap();
        cache.set("old-2", RateLimitEntry::start(0, 200)).unwrap();
        cache.set("live", RateLimitEntry::start(0, 10_000)).unwrap();

        assert_eq!(cache.sweep(500), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("live", 500).unwrap().is_some());
        assert_eq!(cache.sweep(500), 0);
    }
}
