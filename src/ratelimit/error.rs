use thiserror::Error;

/// Programmer/configuration errors surfaced by the rate limiter.
///
/// Backend failures never show up here; they are absorbed by the
/// service and turned into fail-open results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Unknown rate limit profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}
