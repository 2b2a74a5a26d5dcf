//! Durable counter storage.
//!
//! The store holds one fixed-window counter per key and is shared by every
//! service instance. Backends:
//!
//! - `memory`: process-local, for single instances and tests
//! - `postgres`: `rate_limits` table, swept periodically
//! - `redis`: one hash per key with native expiry

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;
mod redis_backend;

pub use backend::{CounterStore, StoreBackendType, StoreError};
pub use factory::create_counter_store;
pub use memory_backend::MemoryCounterStore;
pub use postgres_backend::PostgresCounterStore;
pub use redis_backend::RedisCounterStore;
