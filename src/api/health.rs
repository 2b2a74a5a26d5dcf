//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::circuit_breaker::{CircuitBreakerStats, CircuitState};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub ratelimit: RateLimitHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerStats>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitHealthResponse {
    pub enabled: bool,
    pub store_backend: String,
    pub cache_entries: usize,
    pub store_timeout_ms: u64,
}

/// GET /health
///
/// Reports `degraded` while the store's circuit breaker is open; checks
/// keep succeeding in that state by failing open.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.rate_limiter.stats();
    let circuit_breaker = state.store_circuit_breaker.as_ref().map(|cb| cb.stats());

    let status = match &circuit_breaker {
        Some(cb) if cb.state == CircuitState::Open => "degraded",
        _ => "healthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        ratelimit: RateLimitHealthResponse {
            enabled: state.settings.ratelimit.enabled,
            store_backend: stats.store_backend.to_string(),
            cache_entries: stats.cache_entries,
            store_timeout_ms: stats.store_timeout_ms,
        },
        circuit_breaker,
    })
}
