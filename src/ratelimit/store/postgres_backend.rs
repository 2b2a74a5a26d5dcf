//! PostgreSQL-based counter store backend.
//!
//! One row per counter key in the `rate_limits` table. Calls go through the
//! pool's circuit breaker.

use std::sync::Arc;

use async_trait::async_trait;

use crate::postgres::PostgresPool;
use crate::ratelimit::entry::RateLimitEntry;

use super::backend::{CounterStore, StoreBackendType, StoreError};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS rate_limits (
    key           TEXT PRIMARY KEY,
    count         INTEGER NOT NULL,
    reset_time    BIGINT NOT NULL,
    first_request BIGINT NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_rate_limits_reset_time ON rate_limits (reset_time)";

pub struct PostgresCounterStore {
    pool: Arc<PostgresPool>,
}

impl PostgresCounterStore {
    pub fn new(pool: Arc<PostgresPool>) -> Self {
        Self { pool }
    }

    /// Create the counter table and its expiry index if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.pool
            .execute(|pool| async move {
                sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
                sqlx::query(CREATE_INDEX_SQL).execute(&pool).await?;
                Ok::<(), sqlx::Error>(())
            })
            .await?;

        tracing::info!("Rate limit table ready");
        Ok(())
    }
}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Postgres
    }

    async fn read(&self, key: &str, now: i64) -> Result<Option<RateLimitEntry>, StoreError> {
        let owned_key = key.to_string();
        let row: Option<(i32, i64, i64)> = self
            .pool
            .execute(|pool| async move {
                sqlx::query_as::<_, (i32, i64, i64)>(
                    r#"
                    SELECT count, reset_time, first_request
                    FROM rate_limits
                    WHERE key = $1 AND reset_time >= $2
                    "#,
                )
                .bind(&owned_key)
                .bind(now)
                .fetch_optional(&pool)
                .await
            })
            .await?;

        row.map(|(count, reset_time, first_request)| {
            let count = u32::try_from(count).map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("negative count {}", count),
            })?;
            Ok(RateLimitEntry {
                count,
                reset_time,
                first_request,
            })
        })
        .transpose()
    }

    async fn write(&self, key: &str, entry: &RateLimitEntry) -> Result<(), StoreError> {
        let owned_key = key.to_string();
        let count = i32::try_from(entry.count).unwrap_or(i32::MAX);
        let entry = *entry;

        self.pool
            .execute(|pool| async move {
                sqlx::query(
                    r#"
                    INSERT INTO rate_limits (key, count, reset_time, first_request, updated_at)
                    VALUES ($1, $2, $3, $4, NOW())
                    ON CONFLICT (key) DO UPDATE SET
                        count = EXCLUDED.count,
                        reset_time = EXCLUDED.reset_time,
                        first_request = EXCLUDED.first_request,
                        updated_at = NOW()
                    "#,
                )
                .bind(&owned_key)
                .bind(count)
                .bind(entry.reset_time)
                .bind(entry.first_request)
                .execute(&pool)
                .await
            })
            .await?;

        tracing::trace!(key = %key, count = entry.count, "Counter persisted to PostgreSQL");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let owned_key = key.to_string();
        self.pool
            .execute(|pool| async move {
                sqlx::query("DELETE FROM rate_limits WHERE key = $1")
                    .bind(&owned_key)
                    .execute(&pool)
                    .await
            })
            .await?;
        Ok(())
    }

    async fn sweep(&self, now: i64) -> Result<usize, StoreError> {
        let result = self
            .pool
            .execute(|pool| async move {
                sqlx::query("DELETE FROM rate_limits WHERE reset_time < $1")
                    .bind(now)
                    .execute(&pool)
                    .await
            })
            .await?;

        let count = result.rows_affected() as usize;
        if count > 0 {
            tracing::debug!(expired = count, "Swept expired counters from PostgreSQL");
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_shape() {
        assert!(CREATE_TABLE_SQL.contains("key           TEXT PRIMARY KEY"));
        assert!(CREATE_TABLE_SQL.contains("reset_time    BIGINT"));
        assert!(CREATE_INDEX_SQL.contains("(reset_time)"));
    }
}
