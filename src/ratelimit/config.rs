//! Rate limiting configuration: named profiles and per-check configs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RateLimitSettings;

use super::error::RateLimitError;

/// Namespace prepended to every default counter key
pub const KEY_NAMESPACE: &str = "rate_limit";

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Longest accepted window (365 days)
pub const MAX_WINDOW_MS: u64 = 365 * 24 * HOUR_MS;

/// Derives a counter key from an identifier.
pub type KeyGenerator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named limit presets, one per endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Api,
    Auth,
    Upload,
    Ai,
    Webhook,
    Strict,
}

impl Profile {
    pub const ALL: [Profile; 6] = [
        Profile::Api,
        Profile::Auth,
        Profile::Upload,
        Profile::Ai,
        Profile::Webhook,
        Profile::Strict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Api => "api",
            Profile::Auth => "auth",
            Profile::Upload => "upload",
            Profile::Ai => "ai",
            Profile::Webhook => "webhook",
            Profile::Strict => "strict",
        }
    }

    /// Built-in `(window_ms, max_requests)` for the profile.
    pub fn defaults(&self) -> (u64, u32) {
        match self {
            Profile::Api => (15 * MINUTE_MS, 100),
            Profile::Auth => (15 * MINUTE_MS, 5),
            Profile::Upload => (HOUR_MS, 10),
            Profile::Ai => (HOUR_MS, 50),
            // Internal callers, deliberately loose
            Profile::Webhook => (5 * MINUTE_MS, 1000),
            Profile::Strict => (MINUTE_MS, 10),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RateLimitError::UnknownProfile(s.to_string()))
    }
}

/// Limits applied by a single check.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    /// Successful requests are refunded by the HTTP middleware
    pub skip_successful_requests: bool,
    key_generator: Option<KeyGenerator>,
    profile: Option<Profile>,
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32) -> Result<Self, RateLimitError> {
        if window_ms == 0 {
            return Err(RateLimitError::InvalidConfig(
                "window_ms must be positive".to_string(),
            ));
        }
        if window_ms > MAX_WINDOW_MS {
            return Err(RateLimitError::InvalidConfig(format!(
                "window_ms must not exceed {}",
                MAX_WINDOW_MS
            )));
        }
        if max_requests == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max_requests must be positive".to_string(),
            ));
        }

        Ok(Self {
            window_ms,
            max_requests,
            skip_successful_requests: false,
            key_generator: None,
            profile: None,
        })
    }

    /// Default limits of a profile.
    pub fn for_profile(profile: Profile) -> Self {
        let (window_ms, max_requests) = profile.defaults();
        Self {
            window_ms,
            max_requests,
            skip_successful_requests: false,
            key_generator: None,
            profile: Some(profile),
        }
    }

    pub fn with_skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = skip;
        self
    }

    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Scope counters to one endpoint: `rate_limit:<endpoint>:<identifier>`.
    pub fn with_endpoint_key(self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.with_key_generator(move |identifier| {
            format!("{}:{}:{}", KEY_NAMESPACE, endpoint, identifier)
        })
    }

    /// Copy with the window and/or max replaced, revalidated.
    pub fn with_overrides(
        &self,
        window_ms: Option<u64>,
        max_requests: Option<u32>,
    ) -> Result<Self, RateLimitError> {
        let mut config = RateLimitConfig::new(
            window_ms.unwrap_or(self.window_ms),
            max_requests.unwrap_or(self.max_requests),
        )?;
        config.skip_successful_requests = self.skip_successful_requests;
        config.key_generator = self.key_generator.clone();
        config.profile = self.profile;
        Ok(config)
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        self.profile.map(|p| p.as_str()).unwrap_or("custom")
    }

    pub fn key_for(&self, identifier: &str) -> String {
        match (&self.key_generator, self.profile) {
            (Some(generator), _) => generator(identifier),
            (None, Some(profile)) => default_key(Some(profile), identifier),
            (None, None) => default_key(None, identifier),
        }
    }
}

/// Key used when no custom generator is set.
pub fn default_key(profile: Option<Profile>, identifier: &str) -> String {
    match profile {
        Some(profile) => format!("{}:{}:{}", KEY_NAMESPACE, profile, identifier),
        None => format!("{}:{}", KEY_NAMESPACE, identifier),
    }
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("window_ms", &self.window_ms)
            .field("max_requests", &self.max_requests)
            .field("skip_successful_requests", &self.skip_successful_requests)
            .field("custom_key", &self.key_generator.is_some())
            .field("profile", &self.profile)
            .finish()
    }
}

/// Public view of a profile's limits.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileInfo {
    pub name: Profile,
    pub window_ms: u64,
    pub max_requests: u32,
    pub skip_successful_requests: bool,
}

/// Resolved configuration for every profile, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    configs: HashMap<Profile, RateLimitConfig>,
}

impl ProfileTable {
    /// Apply per-profile overrides from settings on top of the defaults.
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self, RateLimitError> {
        let mut table = Self::default();

        for (name, overrides) in &settings.profiles {
            let profile: Profile = name.parse()?;
            let base = table.get(profile);
            let config = base
                .with_overrides(overrides.window_ms, overrides.max_requests)?
                .with_skip_successful_requests(
                    overrides
                        .skip_successful_requests
                        .unwrap_or(base.skip_successful_requests),
                );

            tracing::debug!(
                profile = %profile,
                window_ms = config.window_ms,
                max_requests = config.max_requests,
                "Rate limit profile overridden"
            );
            table.configs.insert(profile, config);
        }

        Ok(table)
    }

    pub fn get(&self, profile: Profile) -> &RateLimitConfig {
        // Every profile is inserted at construction
        &self.configs[&profile]
    }

    pub fn resolve(&self, name: &str) -> Result<&RateLimitConfig, RateLimitError> {
        let profile: Profile = name.parse()?;
        Ok(self.get(profile))
    }

    pub fn list(&self) -> Vec<ProfileInfo> {
        Profile::ALL
            .into_iter()
            .map(|profile| {
                let config = self.get(profile);
                ProfileInfo {
                    name: profile,
                    window_ms: config.window_ms,
                    max_requests: config.max_requests,
                    skip_successful_requests: config.skip_successful_requests,
                }
            })
            .collect()
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            configs: Profile::ALL
                .into_iter()
                .map(|p| (p, RateLimitConfig::for_profile(p)))
                .collect(),
        }
    }
}
