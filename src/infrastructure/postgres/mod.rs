//! PostgreSQL persistence module.
//!
//! Provides the connection pool backing the PostgreSQL counter store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
