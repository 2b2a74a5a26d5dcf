//! In-memory counter store backend using DashMap.
//!
//! Counters live only as long as the process; suited to single-instance
//! deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::ratelimit::entry::RateLimitEntry;

use super::backend::{CounterStore, StoreBackendType, StoreError};

#[derive(Default)]
pub struct MemoryCounterStore {
    rows: DashMap<String, RateLimitEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Memory
    }

    async fn read(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, StoreError> {
        Ok(self
            .rows
            .get(key)
            .map(|row| *row)
            .filter(|entry| entry.reset_time >= now))
    }

    async fn write(&self, key: &str, entry: &RateLimitEntry) -> Result<(), StoreError> {
        self.rows.insert(key.to_string(), *entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.rows.remove(key);
        Ok(())
    }

    async fn sweep(&self, now: i64) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows.retain(|_, entry| entry.reset_time >= now);
        Ok(before.saturating_sub(self.rows.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryCounterStore::new();
        let entry = RateLimitEntry::start(1_000, 5_000);

        store.write("k", &entry).await.unwrap();
        assert_eq!(store.read("k", 2_000).await.unwrap(), Some(entry));
        assert_eq!(store.backend_type(), StoreBackendType::Memory);
    }

    #[tokio::test]
    async fn test_expired_row_reads_as_absent() {
        let store = MemoryCounterStore::new();
        store
            .write("k", &RateLimitEntry::start(0, 1_000))
            .await
            .unwrap();

        assert!(store.read("k", 1_000).await.unwrap().is_some());
        assert!(store.read("k", 1_001).await.unwrap().is_none());
        // Still physically present until swept
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_sweep() {
        let store = MemoryCounterStore::new();
        store.write("a", &RateLimitEntry::start(0, 100)).await.unwrap();
        store.write("b", &RateLimitEntry::start(0, 10_000)).await.unwrap();
        store.write("c", &RateLimitEntry::start(0, 10_000)).await.unwrap();

        store.delete("c").await.unwrap();
        assert_eq!(store.sweep(1_000).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.read("b", 1_000).await.unwrap().is_some());
    }
}
