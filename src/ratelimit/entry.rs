//! Counter entries and check results

use serde::{Deserialize, Serialize};

use super::config::RateLimitConfig;

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fixed-window counter for one key.
///
/// `reset_time == first_request + window_ms` for the window that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub count: u32,
    /// Window end (ms since epoch)
    pub reset_time: i64,
    /// Window start (ms since epoch)
    pub first_request: i64,
}

impl RateLimitEntry {
    /// First hit of a new window.
    pub fn start(now: i64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_time: now.saturating_add(i64::try_from(window_ms).unwrap_or(i64::MAX)),
            first_request: now,
        }
    }

    /// An expired entry must never be reused.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.reset_time
    }

    pub fn record_hit(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: i64,
    pub total_hits: u32,
}

impl RateLimitResult {
    pub fn from_entry(entry: &RateLimitEntry, max_requests: u32) -> Self {
        Self {
            allowed: entry.count <= max_requests,
            remaining: max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
            total_hits: entry.count,
        }
    }

    /// Answer given when the check could not be evaluated.
    pub fn fail_open(now: i64, config: &RateLimitConfig) -> Self {
        Self::from_entry(&RateLimitEntry::start(now, config.window_ms), config.max_requests)
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: i64) -> u64 {
        let ms = self.reset_time.saturating_sub(now).max(0) as u64;
        ms.div_ceil(1000)
    }

    /// Share of the quota consumed, 0.0 to 100.0.
    pub fn usage_percentage(&self, max_requests: u32) -> f64 {
        if max_requests == 0 {
            return 100.0;
        }
        let used = self.total_hits.min(max_requests);
        f64::from(used) * 100.0 / f64::from(max_requests)
    }

    pub fn retry_message(&self, now: i64) -> String {
        format!(
            "Too many requests, please try again in {}",
            format_time_until_reset(self.reset_time, now)
        )
    }
}

/// Human readable time left in a window: "1h 5m", "2m 30s", "45s", "0s".
pub fn format_time_until_reset(reset_time: i64, now: i64) -> String {
    let total_secs = (reset_time.saturating_sub(now).max(0) as u64).div_ceil(1000);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
