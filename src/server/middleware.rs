use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::AppState;
use crate::ratelimit::{now_millis, resolve_identity, session_cookie_header, Profile, RateLimitResult};

/// API Key authentication middleware
/// Validates X-API-Key header against configured api.key
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (development mode)
    let Some(expected_key) = &state.settings.api.key else {
        return Ok(next.run(req).await);
    };

    let api_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if key == expected_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing API key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Per-profile rate limiting middleware.
///
/// Counts the request against the caller's user or session identity and
/// answers 429 with `Retry-After` once the profile's quota is used up.
/// Successful responses are refunded when the profile skips them.
///
/// ```rust,ignore
/// router.layer(middleware::from_fn_with_state(
///     (state.clone(), Profile::Upload),
///     rate_limit_middleware,
/// ))
/// ```
pub async fn rate_limit_middleware(
    State((state, profile)): State<(AppState, Profile)>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.settings.ratelimit.enabled {
        return next.run(req).await;
    }

    let resolved = resolve_identity(
        req.headers(),
        state.jwt_validator.as_deref(),
        &state.settings.ratelimit.session_cookie,
    );
    let identifier = resolved.identity.identifier();
    let config = state.rate_limiter.profiles().get(profile);

    let result = state.rate_limiter.check_limit(&identifier, config).await;

    let mut response = if result.allowed {
        let response = next.run(req).await;
        if config.skip_successful_requests && response.status().is_success() {
            state.rate_limiter.refund(&identifier, config).await;
        }
        response
    } else {
        tracing::warn!(
            identifier = %identifier,
            profile = %profile,
            total_hits = result.total_hits,
            "Rate limit exceeded"
        );
        rate_limit_response(&result, now_millis())
    };

    insert_rate_limit_headers(response.headers_mut(), &result, config.max_requests);

    if let Some(session) = resolved.issued_session {
        let cookie = session_cookie_header(&state.settings.ratelimit.session_cookie, &session);
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, v);
        }
    }

    response
}

/// `X-RateLimit-*` headers; the reset is in epoch seconds.
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult, limit: u32) {
    if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    let reset_secs = result.reset_time.saturating_add(999).div_euclid(1000);
    if let Ok(v) = HeaderValue::from_str(&reset_secs.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

/// Build a rate limit error response with proper headers
fn rate_limit_response(result: &RateLimitResult, now: i64) -> Response {
    let body = json!({
        "error": {
            "code": "RATE_LIMITED",
            "message": result.retry_message(now)
        }
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

    let retry_after = result.retry_after_secs(now).max(1);
    if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, v);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_headers() {
        let result = RateLimitResult {
            allowed: true,
            remaining: 7,
            reset_time: 1_700_000_000_500,
            total_hits: 3,
        };
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, &result, 10);

        assert_eq!(headers["X-RateLimit-Limit"], "10");
        assert_eq!(headers["X-RateLimit-Remaining"], "7");
        assert_eq!(headers["X-RateLimit-Reset"], "1700000001");
    }

    #[test]
    fn test_rate_limit_headers_far_reset() {
        let result = RateLimitResult {
            allowed: true,
            remaining: 0,
            reset_time: i64::MAX,
            total_hits: 1,
        };
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, &result, 1);

        assert_eq!(
            headers["X-RateLimit-Reset"],
            (i64::MAX / 1000).to_string().as_str()
        );
    }

    #[test]
    fn test_rate_limit_response() {
        let result = RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_time: 45_000,
            total_hits: 6,
        };
        let response = rate_limit_response(&result, 0);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "45");
    }
}
