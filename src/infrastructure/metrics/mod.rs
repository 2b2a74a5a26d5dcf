//! Prometheus metrics for the rate limiting service.
//!
//! - Decision metrics (allowed / denied per profile)
//! - Degradation metrics (fail-open checks by source)
//! - Counter store metrics (errors, latency, circuit breaker state)
//! - Cache metrics (live entries, swept entries)

mod helpers;

pub use helpers::{encode_metrics, CacheMetrics, RateLimitMetrics, StoreMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "quota";

lazy_static! {
    // ============================================================================
    // Decision Metrics
    // ============================================================================

    /// Checks that admitted the request
    pub static ref RATELIMIT_ALLOWED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_allowed_total", METRIC_PREFIX),
        "Total requests allowed by the rate limiter",
        &["profile"]
    ).unwrap();

    /// Checks that denied the request
    pub static ref RATELIMIT_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_denied_total", METRIC_PREFIX),
        "Total requests denied by the rate limiter",
        &["profile"]
    ).unwrap();

    /// Checks answered with the fail-open default
    pub static ref RATELIMIT_FAIL_OPEN_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_fail_open_total", METRIC_PREFIX),
        "Total checks allowed because the cache or store failed",
        &["source"]
    ).unwrap();

    /// Counters decremented for successful requests
    pub static ref RATELIMIT_REFUNDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_refunded_total", METRIC_PREFIX),
        "Total hits refunded for successful requests",
        &["profile"]
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total counter store errors by operation",
        &["operation"]
    ).unwrap();

    pub static ref STORE_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_store_latency_seconds", METRIC_PREFIX),
        "Counter store operation latency in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0]
    ).unwrap();

    /// Store circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref STORE_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_store_circuit_breaker_state", METRIC_PREFIX),
        "Counter store circuit breaker state (0=closed, 1=open, 2=half-open)"
    ).unwrap();

    // ============================================================================
    // Cache Metrics
    // ============================================================================

    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        format!("{}_cache_entries", METRIC_PREFIX),
        "Number of counter entries held in the in-process cache"
    ).unwrap();

    pub static ref SWEPT_ENTRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_swept_entries_total", METRIC_PREFIX),
        "Total expired counter entries removed by sweeps",
        &["target"]
    ).unwrap();
}
