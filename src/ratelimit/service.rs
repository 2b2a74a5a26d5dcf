//! Fixed-window rate limit service.
//!
//! Combines the in-process cache with the durable counter store. Backend
//! failures never reach callers: the check fails open instead.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;

use crate::metrics::{RateLimitMetrics, StoreMetrics};

use super::cache::CounterCache;
use super::config::{default_key, Profile, ProfileTable, RateLimitConfig};
use super::entry::{now_millis, RateLimitEntry, RateLimitResult};
use super::error::RateLimitError;
use super::store::{CounterStore, StoreBackendType, StoreError};

/// Snapshot of the limiter's runtime state
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub store_backend: &'static str,
    pub cache_entries: usize,
    pub store_timeout_ms: u64,
}

/// Rate limiter shared by every call site.
///
/// # Example
///
/// ```rust,ignore
/// let service = RateLimitService::new(cache, store, ProfileTable::default(), timeout);
/// let result = service.check_profile("user:42", Profile::Ai).await;
/// if !result.allowed {
///     return Err(result.retry_message(now_millis()));
/// }
/// ```
pub struct RateLimitService {
    cache: Arc<dyn CounterCache>,
    store: Arc<dyn CounterStore>,
    profiles: ProfileTable,
    store_timeout: Duration,
}

impl RateLimitService {
    pub fn new(
        cache: Arc<dyn CounterCache>,
        store: Arc<dyn CounterStore>,
        profiles: ProfileTable,
        store_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            profiles,
            store_timeout,
        }
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn store_backend(&self) -> StoreBackendType {
        self.store.backend_type()
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            store_backend: self.store.backend_type().as_str(),
            cache_entries: self.cache.len(),
            store_timeout_ms: self.store_timeout.as_millis() as u64,
        }
    }

    /// Count one request for `identifier` and decide whether it is allowed.
    ///
    /// Every call increments the counter, denied calls included. A cache
    /// or store failure yields [`RateLimitResult::fail_open`].
    ///
    /// The store read and write are separate calls, so concurrent checks
    /// for the same key can lose increments.
    pub async fn check_limit(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = now_millis();
        let key = config.key_for(identifier);

        let cached = match self.cache.get(&key, now) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate limit cache read failed, allowing request");
                RateLimitMetrics::record_fail_open("cache");
                return RateLimitResult::fail_open(now, config);
            }
        };

        let current = match cached {
            Some(entry) => Some(entry),
            None => match self.timed("read", self.store.read(&key, now)).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Counter store read failed, allowing request");
                    RateLimitMetrics::record_fail_open("store");
                    return RateLimitResult::fail_open(now, config);
                }
            },
        };

        let entry = match current {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.record_hit();
                entry
            }
            _ => RateLimitEntry::start(now, config.window_ms),
        };

        if let Err(e) = self.cache.set(&key, entry) {
            tracing::warn!(key = %key, error = %e, "Rate limit cache write failed, allowing request");
            RateLimitMetrics::record_fail_open("cache");
            return RateLimitResult::fail_open(now, config);
        }

        if let Err(e) = self.timed("write", self.store.write(&key, &entry)).await {
            tracing::warn!(
                key = %key,
                count = entry.count,
                error = %e,
                "Counter store write failed, keeping cached count"
            );
        }

        let result = RateLimitResult::from_entry(&entry, config.max_requests);
        if result.allowed {
            RateLimitMetrics::record_allowed(config.label());
        } else {
            RateLimitMetrics::record_denied(config.label());
            tracing::debug!(
                key = %key,
                total_hits = result.total_hits,
                max_requests = config.max_requests,
                reset_time = result.reset_time,
                "Rate limit exceeded"
            );
        }

        result
    }

    /// Check against a profile's configured limits.
    pub async fn check_profile(&self, identifier: &str, profile: Profile) -> RateLimitResult {
        let config = self.profiles.get(profile);
        self.check_limit(identifier, config).await
    }

    /// Check against a profile looked up by name.
    pub async fn check_named(
        &self,
        identifier: &str,
        profile: &str,
    ) -> Result<RateLimitResult, RateLimitError> {
        let config = self.profiles.resolve(profile)?;
        Ok(self.check_limit(identifier, config).await)
    }

    /// Forget every counter of `identifier`: the ad-hoc key and one key per
    /// profile.
    pub async fn reset_limit(&self, identifier: &str) {
        let keys = std::iter::once(default_key(None, identifier)).chain(
            Profile::ALL
                .into_iter()
                .map(|profile| self.profiles.get(profile).key_for(identifier)),
        );

        join_all(keys.map(|key| async move { self.delete_key(&key).await })).await;

        tracing::info!(identifier = %identifier, "Rate limits reset");
    }

    /// Forget the counter `config` derives for `identifier`.
    pub async fn reset_limit_with(&self, identifier: &str, config: &RateLimitConfig) {
        let key = config.key_for(identifier);
        self.delete_key(&key).await;

        tracing::info!(key = %key, "Rate limit reset");
    }

    /// Give back one request of the current window, if any is counted.
    pub async fn refund(&self, identifier: &str, config: &RateLimitConfig) {
        let now = now_millis();
        let key = config.key_for(identifier);

        // A failed cache read means the check failed open and counted nothing
        let cached = match self.cache.get(&key, now) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate limit cache read failed, refund skipped");
                return;
            }
        };

        let current = match cached {
            Some(entry) => Some(entry),
            None => match self.timed("read", self.store.read(&key, now)).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Counter store read failed during refund");
                    return;
                }
            },
        };

        let Some(mut entry) = current.filter(|e| e.count > 0) else {
            return;
        };
        entry.count -= 1;

        if let Err(e) = self.cache.set(&key, entry) {
            tracing::warn!(key = %key, error = %e, "Rate limit cache write failed during refund");
        }
        if let Err(e) = self.timed("write", self.store.write(&key, &entry)).await {
            tracing::warn!(key = %key, error = %e, "Counter store write failed during refund");
        }

        RateLimitMetrics::record_refund(config.label());
        tracing::trace!(key = %key, count = entry.count, "Request refunded");
    }

    /// Evict expired cache entries.
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep(now_millis())
    }

    /// Delete expired store rows; failures are logged and count as zero.
    pub async fn sweep_store(&self) -> usize {
        match self.timed("sweep", self.store.sweep(now_millis())).await {
            Ok(count) => {
                if count > 0 {
                    StoreMetrics::record_swept(count);
                }
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Counter store sweep failed");
                0
            }
        }
    }

    async fn delete_key(&self, key: &str) {
        if let Err(e) = self.cache.delete(key) {
            tracing::warn!(key = %key, error = %e, "Rate limit cache delete failed");
        }
        if let Err(e) = self.timed("delete", self.store.delete(key)).await {
            tracing::warn!(key = %key, error = %e, "Counter store delete failed");
        }
    }

    /// Bound a store call by the configured timeout and record its latency.
    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout.as_millis() as u64)),
        };

        StoreMetrics::observe_latency(operation, start.elapsed());
        if result.is_err() {
            StoreMetrics::record_error(operation);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::cache::MemoryCache;
    use crate::ratelimit::store::MemoryCounterStore;

    fn service() -> (RateLimitService, Arc<MemoryCache>, Arc<MemoryCounterStore>) {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryCounterStore::new());
        let service = RateLimitService::new(
            cache.clone(),
            store.clone(),
            ProfileTable::default(),
            Duration::from_secs(1),
        );
        (service, cache, store)
    }

    #[tokio::test]
    async fn test_first_request_starts_window() {
        let (service, cache, store) = service();
        let config = RateLimitConfig::new(60_000, 5).unwrap();

        let before = now_millis();
        let result = service.check_limit("u1", &config).await;

        assert!(result.allowed);
        assert_eq!(result.remaining, 4);
        assert_eq!(result.total_hits, 1);
        assert!(result.reset_time >= before + 60_000);

        let cached = cache.get("rate_limit:u1", before).unwrap().unwrap();
        let stored = store.read("rate_limit:u1", before).await.unwrap().unwrap();
        assert_eq!(cached, stored);
        assert_eq!(cached.count, 1);
    }

    #[tokio::test]
    async fn test_store_seeds_cache_on_miss() {
        let (service, cache, store) = service();
        let config = RateLimitConfig::new(60_000, 10).unwrap();
        let now = now_millis();

        store
            .write(
                "rate_limit:u1",
                &RateLimitEntry {
                    count: 7,
                    reset_time: now + 30_000,
                    first_request: now - 30_000,
                },
            )
            .await
            .unwrap();

        let result = service.check_limit("u1", &config).await;
        assert_eq!(result.total_hits, 8);
        assert_eq!(result.remaining, 2);
        assert_eq!(cache.get("rate_limit:u1", now).unwrap().map(|e| e.count), Some(8));
    }

    #[tokio::test]
    async fn test_profiles_use_separate_counters() {
        let (service, _, _) = service();

        service.check_profile("user:1", Profile::Auth).await;
        service.check_profile("user:1", Profile::Auth).await;
        let api = service.check_profile("user:1", Profile::Api).await;
        let auth = service.check_profile("user:1", Profile::Auth).await;

        assert_eq!(api.total_hits, 1);
        assert_eq!(auth.total_hits, 3);
        assert_eq!(auth.remaining, 2);
    }

    #[tokio::test]
    async fn test_check_named_rejects_unknown_profile() {
        let (service, _, _) = service();

        let err = service.check_named("u1", "chat").await.unwrap_err();
        assert_eq!(err, RateLimitError::UnknownProfile("chat".to_string()));

        let ok = service.check_named("u1", "strict").await.unwrap();
        assert_eq!(ok.remaining, 9);
    }

    #[tokio::test]
    async fn test_refund_gives_back_one_request() {
        let (service, _, _) = service();
        let config = RateLimitConfig::new(60_000, 3).unwrap();

        service.check_limit("u1", &config).await;
        service.check_limit("u1", &config).await;
        service.refund("u1", &config).await;

        let result = service.check_limit("u1", &config).await;
        assert_eq!(result.total_hits, 2);
        assert_eq!(result.remaining, 1);

        // Nothing counted, nothing to refund
        service.refund("u2", &config).await;
        assert_eq!(service.check_limit("u2", &config).await.total_hits, 1);
    }

    #[tokio::test]
    async fn test_sweeps_and_stats() {
        let (service, cache, store) = service();
        let now = now_millis();
        let stale = RateLimitEntry {
            count: 2,
            reset_time: now - 1_000,
            first_request: now - 61_000,
        };
        cache.set("rate_limit:old", stale).unwrap();
        store.write("rate_limit:old", &stale).await.unwrap();

        service
            .check_limit("u1", &RateLimitConfig::new(60_000, 5).unwrap())
            .await;

        assert_eq!(service.sweep_cache(), 1);
        assert_eq!(service.sweep_store().await, 1);

        let stats = service.stats();
        assert_eq!(stats.store_backend, "memory");
        assert_eq!(stats.cache_entries, 1);
        assert_eq!(stats.store_timeout_ms, 1000);
    }
}
