//! Counter store factory

use std::sync::Arc;

use crate::config::RateLimitSettings;
use crate::postgres::PostgresPool;
use crate::redis::RedisPool;

use super::backend::CounterStore;
use super::memory_backend::MemoryCounterStore;
use super::postgres_backend::PostgresCounterStore;
use super::redis_backend::RedisCounterStore;

/// Create a counter store based on the `backend` setting.
///
/// - `"postgres"`: `PostgresCounterStore` if a PostgreSQL pool is provided
/// - `"redis"`: `RedisCounterStore` if a Redis pool is provided
/// - anything else: `MemoryCounterStore`
///
/// A durable backend without its pool falls back to memory with a warning.
pub fn create_counter_store(
    settings: &RateLimitSettings,
    postgres_pool: Option<Arc<PostgresPool>>,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn CounterStore> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL counter store");
                Arc::new(PostgresCounterStore::new(pool))
            } else {
                tracing::warn!(
                    "PostgreSQL counter store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryCounterStore::new())
            }
        }
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis counter store"
                );
                Arc::new(RedisCounterStore::new(pool, settings.redis_prefix.clone()))
            } else {
                tracing::warn!(
                    "Redis counter store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryCounterStore::new())
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory counter store");
            Arc::new(MemoryCounterStore::new())
        }
        other => {
            tracing::warn!(backend = %other, "Unknown counter store backend, using memory");
            Arc::new(MemoryCounterStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::store::StoreBackendType;

    fn settings(backend: &str) -> RateLimitSettings {
        RateLimitSettings {
            backend: backend.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_backend() {
        let store = create_counter_store(&settings("memory"), None, None);
        assert_eq!(store.backend_type(), StoreBackendType::Memory);
    }

    #[test]
    fn test_missing_pool_falls_back_to_memory() {
        let store = create_counter_store(&settings("postgres"), None, None);
        assert_eq!(store.backend_type(), StoreBackendType::Memory);

        let store = create_counter_store(&settings("redis"), None, None);
        assert_eq!(store.backend_type(), StoreBackendType::Memory);

        let store = create_counter_store(&settings("cassandra"), None, None);
        assert_eq!(store.backend_type(), StoreBackendType::Memory);
    }
}
