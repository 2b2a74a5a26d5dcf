//! Redis connectivity for the Redis counter store.

pub mod pool;

pub use pool::{PoolError, RedisPool};
