//! Rate limit management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::ratelimit::{now_millis, Profile, ProfileInfo, RateLimitConfig, RateLimitResult};
use crate::server::AppState;

/// Request to count one hit against an identifier
#[derive(Debug, Deserialize)]
pub struct CheckLimitRequest {
    /// Caller identity, e.g. "user:42"
    pub identifier: String,
    /// Named profile; an ad-hoc limit is used when absent
    pub profile: Option<String>,
    /// Window override in milliseconds
    pub window_ms: Option<u64>,
    /// Quota override
    pub max_requests: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CheckLimitResponse {
    #[serde(flatten)]
    pub result: RateLimitResult,
    pub limit: u32,
    pub window_ms: u64,
    pub retry_after_seconds: u64,
    /// Present when the request was denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetLimitQuery {
    /// Reset only this profile's counter
    pub profile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<ProfileInfo>,
}

/// POST /api/v1/limits/check
pub async fn check_limit(
    State(state): State<AppState>,
    Json(request): Json<CheckLimitRequest>,
) -> Result<Json<CheckLimitResponse>> {
    let identifier = request.identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::Validation("identifier must not be empty".to_string()));
    }

    let profiles = state.rate_limiter.profiles();
    let config = match request.profile.as_deref() {
        Some(name) => profiles
            .resolve(name)?
            .with_overrides(request.window_ms, request.max_requests)?,
        // Ad-hoc limits start from the api profile's numbers
        None => {
            let api = profiles.get(Profile::Api);
            RateLimitConfig::new(
                request.window_ms.unwrap_or(api.window_ms),
                request.max_requests.unwrap_or(api.max_requests),
            )?
        }
    };

    let result = state.rate_limiter.check_limit(identifier, &config).await;
    let now = now_millis();

    tracing::debug!(
        identifier = %identifier,
        profile = config.label(),
        allowed = result.allowed,
        remaining = result.remaining,
        "Rate limit checked"
    );

    Ok(Json(CheckLimitResponse {
        result,
        limit: config.max_requests,
        window_ms: config.window_ms,
        retry_after_seconds: if result.allowed { 0 } else { result.retry_after_secs(now) },
        message: (!result.allowed).then(|| result.retry_message(now)),
    }))
}

/// DELETE /api/v1/limits/{identifier}
pub async fn reset_limit(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<ResetLimitQuery>,
) -> Result<StatusCode> {
    match query.profile.as_deref() {
        Some(name) => {
            let config = state.rate_limiter.profiles().resolve(name)?;
            state.rate_limiter.reset_limit_with(&identifier, config).await;
        }
        None => state.rate_limiter.reset_limit(&identifier).await,
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/profiles
pub async fn list_profiles(State(state): State<AppState>) -> Json<ProfilesResponse> {
    Json(ProfilesResponse {
        profiles: state.rate_limiter.profiles().list(),
    })
}
