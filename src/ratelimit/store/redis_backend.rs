//! Redis-backed counter store.
//!
//! Each counter is a hash (`count`, `reset_time`, `first_request`,
//! `updated_at`) that Redis expires at `reset_time`, so no sweep is needed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::ratelimit::entry::{now_millis, RateLimitEntry};
use crate::redis::RedisPool;

use super::backend::{CounterStore, StoreBackendType, StoreError};

pub struct RedisCounterStore {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisCounterStore {
    pub fn new(pool: Arc<RedisPool>, prefix: String) -> Self {
        Self { pool, prefix }
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

/// Decode a counter hash; an empty hash means no row.
fn parse_entry(key: &str, fields: &HashMap<String, i64>) -> Result<Option<RateLimitEntry>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let field = |name: &str| {
        fields.get(name).copied().ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("missing field {}", name),
        })
    };

    let count = field("count")?;
    let count = u32::try_from(count).map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("count out of range: {}", count),
    })?;

    Ok(Some(RateLimitEntry {
        count,
        reset_time: field("reset_time")?,
        first_request: field("first_request")?,
    }))
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Redis
    }

    async fn read(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, StoreError> {
        let redis_key = self.redis_key(key);
        let fields: HashMap<String, i64> = self
            .pool
            .execute(|mut conn| async move { conn.hgetall::<_, HashMap<String, i64>>(&redis_key).await })
            .await?;

        Ok(parse_entry(key, &fields)?.filter(|entry| entry.reset_time >= now))
    }

    async fn write(&self, key: &str, entry: &RateLimitEntry) -> Result<(), StoreError> {
        let redis_key = self.redis_key(key);
        let entry = *entry;

        self.pool
            .execute(|mut conn| async move {
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .hset_multiple(
                        &redis_key,
                        &[
                            ("count", i64::from(entry.count)),
                            ("reset_time", entry.reset_time),
                            ("first_request", entry.first_request),
                            ("updated_at", now_millis()),
                        ],
                    )
                    .ignore()
                    .pexpire_at(&redis_key, entry.reset_time)
                    .ignore();
                let _: () = pipe.query_async(&mut conn).await?;
                Ok::<(), redis::RedisError>(())
            })
            .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let redis_key = self.redis_key(key);
        self.pool
            .execute(|mut conn| async move { conn.del::<_, ()>(&redis_key).await })
            .await?;
        Ok(())
    }

    async fn sweep(&self, _now: i64) -> Result<usize, StoreError> {
        // Keys carry PEXPIREAT at their reset time
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_empty_hash_is_absent() {
        assert_eq!(parse_entry("k", &HashMap::new()).unwrap(), None);
    }

    #[test]
    fn test_parse_full_hash() {
        let hash = fields(&[
            ("count", 3),
            ("reset_time", 60_000),
            ("first_request", 0),
            ("updated_at", 10),
        ]);
        let entry = parse_entry("k", &hash).unwrap().unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.reset_time, 60_000);
        assert_eq!(entry.first_request, 0);
    }

    #[test]
    fn test_parse_rejects_partial_hash() {
        let hash = fields(&[("count", 3)]);
        assert!(matches!(
            parse_entry("k", &hash),
            Err(StoreError::Corrupt { .. })
        ));

        let hash = fields(&[("count", -1), ("reset_time", 1), ("first_request", 0)]);
        assert!(parse_entry("k", &hash).is_err());
    }
}
