use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::config::RateLimitSettings;
use crate::ratelimit::RateLimitService;

/// Background task evicting expired counters from the cache and the store
pub struct SweeperTask {
    service: Arc<RateLimitService>,
    cache_interval: Duration,
    store_interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl SweeperTask {
    pub fn new(
        settings: &RateLimitSettings,
        service: Arc<RateLimitService>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self::with_intervals(
            service,
            Duration::from_secs(settings.cache_sweep_interval_seconds.max(1)),
            Duration::from_secs(settings.store_sweep_interval_seconds.max(1)),
            shutdown,
        )
    }

    pub fn with_intervals(
        service: Arc<RateLimitService>,
        cache_interval: Duration,
        store_interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            service,
            cache_interval,
            store_interval,
            shutdown,
        }
    }

    /// Run both sweeps until the shutdown signal fires
    pub async fn run(mut self) {
        let mut cache_timer = tokio::time::interval(self.cache_interval);
        let mut store_timer = tokio::time::interval(self.store_interval);

        // Skip immediate first tick
        cache_timer.tick().await;
        store_timer.tick().await;

        tracing::info!(
            cache_interval_secs = self.cache_interval.as_secs(),
            store_interval_secs = self.store_interval.as_secs(),
            "Sweeper task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Sweeper task received shutdown signal");
                    break;
                }
                _ = cache_timer.tick() => {
                    let removed = self.service.sweep_cache();
                    tracing::trace!(removed = removed, "Cache sweep finished");
                }
                _ = store_timer.tick() => {
                    self.sweep_store().await;
                }
            }
        }

        tracing::info!("Sweeper task stopped");
    }

    async fn sweep_store(&self) {
        let start = Instant::now();
        let removed = self.service.sweep_store().await;

        if removed > 0 {
            tracing::info!(
                removed = removed,
                duration_ms = start.elapsed().as_millis() as u64,
                backend = %self.service.store_backend(),
                "Expired counters swept from store"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{
        now_millis, CounterCache, CounterStore, MemoryCache, MemoryCounterStore, ProfileTable,
        RateLimitEntry,
    };

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops() {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryCounterStore::new());
        let service = Arc::new(RateLimitService::new(
            cache.clone(),
            store.clone(),
            ProfileTable::default(),
            Duration::from_secs(1),
        ));

        let now = now_millis();
        let stale = RateLimitEntry {
            count: 4,
            reset_time: now - 10,
            first_request: now - 1_010,
        };
        cache.set("rate_limit:old", stale).unwrap();
        store.write("rate_limit:old", &stale).await.unwrap();

        let (tx, rx) = broadcast::channel(1);
        let task = SweeperTask::with_intervals(
            service,
            Duration::from_millis(20),
            Duration::from_millis(20),
            rx,
        );
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.is_empty());
        assert!(store.is_empty());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop on shutdown")
            .unwrap();
    }
}
