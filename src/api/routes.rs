use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::ratelimit::Profile;
use crate::server::middleware::{api_key_auth, rate_limit_middleware};
use crate::server::AppState;

use super::handlers::{check_limit, list_profiles, reset_limit};
use super::health::health;
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Rate limit management
        .nest(
            "/api/v1",
            Router::new()
                .route("/profiles", get(list_profiles))
                .route("/limits/check", post(check_limit))
                .route("/limits/{identifier}", delete(reset_limit))
                .layer(middleware::from_fn_with_state(
                    (state.clone(), Profile::Api),
                    rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
