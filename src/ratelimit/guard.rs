//! Per-call-site limiter handle.

use std::future::Future;
use std::sync::{Arc, Mutex};

use super::config::{Profile, RateLimitConfig};
use super::entry::{format_time_until_reset, RateLimitResult};
use super::service::RateLimitService;

/// Gates actions for one identifier behind one configuration.
///
/// Remembers the last check so callers can render quota state without
/// issuing another check.
///
/// # Example
///
/// ```rust,ignore
/// let guard = RateLimitGuard::for_profile(service.clone(), "user:42", Profile::Ai);
/// match guard.execute_with_limit(|| send_chat(message), false).await {
///     Some(reply) => reply?,
///     None => return Err(guard.time_until_reset(now_millis())),
/// }
/// ```
pub struct RateLimitGuard {
    service: Arc<RateLimitService>,
    identifier: String,
    config: RateLimitConfig,
    last_result: Mutex<Option<RateLimitResult>>,
}

impl RateLimitGuard {
    pub fn new(
        service: Arc<RateLimitService>,
        identifier: impl Into<String>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            service,
            identifier: identifier.into(),
            config,
            last_result: Mutex::new(None),
        }
    }

    /// Guard using a profile's configured limits.
    pub fn for_profile(
        service: Arc<RateLimitService>,
        identifier: impl Into<String>,
        profile: Profile,
    ) -> Self {
        let config = service.profiles().get(profile).clone();
        Self::new(service, identifier, config)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn check(&self) -> RateLimitResult {
        let result = self.service.check_limit(&self.identifier, &self.config).await;
        self.remember(Some(result));
        result
    }

    /// Run `action` unless the limit is exhausted.
    ///
    /// Returns `None` without running `action` when the check denies.
    /// With `skip_check` the action runs and nothing is counted.
    pub async fn execute_with_limit<T, F, Fut>(&self, action: F, skip_check: bool) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !skip_check {
            let result = self.check().await;
            if !result.allowed {
                tracing::debug!(
                    identifier = %self.identifier,
                    reset_time = result.reset_time,
                    "Action skipped, rate limit exceeded"
                );
                return None;
            }
        }

        Some(action().await)
    }

    pub async fn reset(&self) {
        self.service
            .reset_limit_with(&self.identifier, &self.config)
            .await;
        self.remember(None);
    }

    pub fn last_result(&self) -> Option<RateLimitResult> {
        match self.last_result.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Requests left in the window; the full quota before any check.
    pub fn remaining(&self) -> u32 {
        self.last_result()
            .map(|r| r.remaining)
            .unwrap_or(self.config.max_requests)
    }

    pub fn is_limited(&self) -> bool {
        self.last_result().is_some_and(|r| !r.allowed)
    }

    pub fn time_until_reset(&self, now: i64) -> String {
        match self.last_result() {
            Some(result) => format_time_until_reset(result.reset_time, now),
            None => format_time_until_reset(now, now),
        }
    }

    pub fn usage_percentage(&self) -> f64 {
        self.last_result()
            .map(|r| r.usage_percentage(self.config.max_requests))
            .unwrap_or(0.0)
    }

    fn remember(&self, result: Option<RateLimitResult>) {
        match self.last_result.lock() {
            Ok(mut guard) => *guard = result,
            Err(poisoned) => *poisoned.into_inner() = result,
        }
    }
}
