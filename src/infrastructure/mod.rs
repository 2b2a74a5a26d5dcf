//! Infrastructure layer modules
//!
//! Shared components the rate limiter runs on:
//! - `auth`: JWT validation for user identities
//! - `circuit_breaker`: Failure isolation for counter store backends
//! - `config`: Application configuration and settings
//! - `error`: Unified API error type
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connection pool

pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
