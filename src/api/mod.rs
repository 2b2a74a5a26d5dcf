//! API layer - HTTP endpoint handlers.

mod handlers;
mod health;
mod metrics;
mod routes;

pub use handlers::{check_limit, list_profiles, reset_limit};
pub use handlers::{CheckLimitRequest, CheckLimitResponse, ProfilesResponse, ResetLimitQuery};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
