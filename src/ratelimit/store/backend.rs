//! Backend trait for the fixed-window counter store.
//!
//! The store is the system of record for counters. Different backends
//! (memory, PostgreSQL, Redis) can be used interchangeably.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::postgres::PostgresPoolError;
use crate::redis::PoolError;

use crate::ratelimit::entry::RateLimitEntry;

/// Errors that can occur during counter store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL query or pool failure
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresPoolError),

    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] PoolError),

    /// The call did not finish within the configured timeout
    #[error("Store operation timed out after {0}ms")]
    Timeout(u64),

    /// Row present but not decodable as a counter entry
    #[error("Corrupt counter row for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Redis(PoolError::Redis(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendType {
    Memory,
    Postgres,
    Redis,
}

impl StoreBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackendType::Memory => "memory",
            StoreBackendType::Postgres => "postgres",
            StoreBackendType::Redis => "redis",
        }
    }
}

impl fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key → counter storage.
///
/// # Thread Safety
///
/// Implementations are shared across request tasks and must be
/// `Send + Sync`.
///
/// # Consistency
///
/// `read` followed by `write` is not atomic. Two concurrent checks for the
/// same key may both read the same count and one increment is lost.
#[async_trait]
pub trait CounterStore: Send + Sync {
    fn backend_type(&self) -> StoreBackendType;

    /// Entry for `key` whose `reset_time >= now`.
    ///
    /// Expired rows are reported absent even if not yet swept.
    async fn read(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, StoreError>;

    /// Upsert the full entry for `key`.
    async fn write(&self, key: &str, entry: &RateLimitEntry) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every row with `reset_time < now`, returning how many went.
    async fn sweep(&self, now: i64) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_names() {
        assert_eq!(StoreBackendType::Memory.to_string(), "memory");
        assert_eq!(StoreBackendType::Postgres.as_str(), "postgres");
        assert_eq!(StoreBackendType::Redis.as_str(), "redis");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Timeout(250);
        assert_eq!(err.to_string(), "Store operation timed out after 250ms");

        let err = StoreError::Corrupt {
            key: "rate_limit:u1".to_string(),
            reason: "missing count".to_string(),
        };
        assert!(err.to_string().contains("rate_limit:u1"));

        let err = StoreError::from(PostgresPoolError::CircuitOpen);
        assert!(err.to_string().contains("Circuit breaker is open"));
    }
}
