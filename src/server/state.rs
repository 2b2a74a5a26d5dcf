use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::JwtValidator;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::Settings;
use crate::error::AppError;
use crate::postgres::PostgresPool;
use crate::ratelimit::{
    create_counter_store, MemoryCache, PostgresCounterStore, ProfileTable, RateLimitService,
};
use crate::redis::RedisPool;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub rate_limiter: Arc<RateLimitService>,
    pub jwt_validator: Option<Arc<JwtValidator>>,
    /// Breaker guarding the durable store; absent for the memory backend
    pub store_circuit_breaker: Option<Arc<CircuitBreaker>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, rate_limiter: Arc<RateLimitService>) -> Self {
        let jwt_validator = settings
            .jwt
            .as_ref()
            .map(|jwt| Arc::new(JwtValidator::new(jwt)));

        Self {
            settings: Arc::new(settings),
            rate_limiter,
            jwt_validator,
            store_circuit_breaker: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_store_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.store_circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Connect the configured counter store and build the rate limiter.
    ///
    /// The PostgreSQL backend has its table created here.
    pub async fn initialize(settings: Settings) -> Result<Self, AppError> {
        let rl = &settings.ratelimit;
        let profiles = ProfileTable::from_settings(rl)?;

        let mut postgres_pool = None;
        let mut redis_pool = None;
        let mut circuit_breaker = None;

        match rl.backend.as_str() {
            "postgres" => {
                let breaker = Arc::new(CircuitBreaker::new("postgres"));
                let pool = PostgresPool::new(&settings.database, breaker.clone())
                    .await
                    .map_err(|e| AppError::Internal(format!("PostgreSQL connection failed: {}", e)))?;
                let pool = Arc::new(pool);

                PostgresCounterStore::new(pool.clone())
                    .ensure_schema()
                    .await
                    .map_err(|e| AppError::Internal(format!("Counter table setup failed: {}", e)))?;

                postgres_pool = Some(pool);
                circuit_breaker = Some(breaker);
            }
            "redis" => {
                let breaker = Arc::new(CircuitBreaker::new("redis"));
                let pool = RedisPool::new(&settings.redis, breaker.clone())
                    .map_err(|e| AppError::Internal(format!("Redis client setup failed: {}", e)))?;
                redis_pool = Some(Arc::new(pool));
                circuit_breaker = Some(breaker);
            }
            _ => {}
        }

        let store = create_counter_store(rl, postgres_pool, redis_pool);
        let rate_limiter = Arc::new(RateLimitService::new(
            Arc::new(MemoryCache::new()),
            store,
            profiles,
            Duration::from_millis(rl.store_timeout_ms),
        ));

        let state = Self::new(settings, rate_limiter);
        Ok(match circuit_breaker {
            Some(breaker) => state.with_store_circuit_breaker(breaker),
            None => state,
        })
    }
}
