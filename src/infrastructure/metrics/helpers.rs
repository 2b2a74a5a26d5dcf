//! Helper structs for recording metrics

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::circuit_breaker::CircuitState;

use super::{
    CACHE_ENTRIES, RATELIMIT_ALLOWED_TOTAL, RATELIMIT_DENIED_TOTAL, RATELIMIT_FAIL_OPEN_TOTAL,
    RATELIMIT_REFUNDED_TOTAL, STORE_CIRCUIT_BREAKER_STATE, STORE_ERRORS_TOTAL, STORE_LATENCY,
    SWEPT_ENTRIES_TOTAL,
};

/// Encode all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Helper struct for rate limit decision metrics
pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_allowed(profile: &str) {
        RATELIMIT_ALLOWED_TOTAL.with_label_values(&[profile]).inc();
    }

    pub fn record_denied(profile: &str) {
        RATELIMIT_DENIED_TOTAL.with_label_values(&[profile]).inc();
    }

    /// `source` is "cache" or "store"
    pub fn record_fail_open(source: &str) {
        RATELIMIT_FAIL_OPEN_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn record_refund(profile: &str) {
        RATELIMIT_REFUNDED_TOTAL.with_label_values(&[profile]).inc();
    }
}

/// Helper struct for counter store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(operation: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn observe_latency(operation: &str, elapsed: Duration) {
        STORE_LATENCY
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_circuit_state(state: CircuitState) {
        STORE_CIRCUIT_BREAKER_STATE.set(state as i64);
    }

    pub fn record_swept(count: usize) {
        SWEPT_ENTRIES_TOTAL
            .with_label_values(&["store"])
            .inc_by(count as u64);
    }
}

/// Helper struct for cache metrics
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn set_entries(count: usize) {
        CACHE_ENTRIES.set(count as i64);
    }

    pub fn record_swept(count: usize) {
        SWEPT_ENTRIES_TOTAL
            .with_label_values(&["cache"])
            .inc_by(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_metrics() {
        RateLimitMetrics::record_allowed("api");
        RateLimitMetrics::record_denied("auth");
        RateLimitMetrics::record_fail_open("store");
        RateLimitMetrics::record_refund("ai");

        assert!(RATELIMIT_ALLOWED_TOTAL.with_label_values(&["api"]).get() >= 1);
        assert!(RATELIMIT_DENIED_TOTAL.with_label_values(&["auth"]).get() >= 1);
    }

    #[test]
    fn test_store_and_cache_metrics() {
        StoreMetrics::record_error("read");
        StoreMetrics::observe_latency("write", Duration::from_millis(3));
        StoreMetrics::set_circuit_state(CircuitState::Closed);
        StoreMetrics::record_swept(2);
        CacheMetrics::set_entries(7);
        CacheMetrics::record_swept(1);

        assert!(STORE_ERRORS_TOTAL.with_label_values(&["read"]).get() >= 1);
    }

    #[test]
    fn test_encode_metrics() {
        RateLimitMetrics::record_allowed("webhook");
        let output = encode_metrics().unwrap();
        assert!(output.contains("quota_ratelimit_allowed_total"));
    }
}
