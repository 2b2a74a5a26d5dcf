//! Fixed-window rate limiting.
//!
//! Counters live in a durable [`CounterStore`] shared by every instance and
//! are mirrored in a per-process [`CounterCache`]. Each check increments the
//! counter for `(identifier, config)`; once the count passes `max_requests`
//! the remaining requests of the window are denied.
//!
//! Infrastructure failures never deny traffic: the service fails open.
//! Only configuration mistakes surface as [`RateLimitError`].
//!
//! Consumers use [`RateLimitService`] directly, a [`RateLimitGuard`] bound to
//! one identifier, or the HTTP middleware in `server::middleware`.

mod cache;
mod config;
mod entry;
mod error;
mod guard;
mod identity;
mod service;
pub mod store;

pub use cache::{CacheError, CounterCache, MemoryCache};
pub use config::{
    default_key, KeyGenerator, Profile, ProfileInfo, ProfileTable, RateLimitConfig, KEY_NAMESPACE,
    MAX_WINDOW_MS,
};
pub use entry::{format_time_until_reset, now_millis, RateLimitEntry, RateLimitResult};
pub use error::RateLimitError;
pub use guard::RateLimitGuard;
pub use identity::{
    generate_session_id, resolve_identity, session_cookie_header, Identity, ResolvedIdentity,
};
pub use service::{RateLimitService, RateLimitStats};
pub use store::{
    create_counter_store, CounterStore, MemoryCounterStore, PostgresCounterStore,
    RedisCounterStore, StoreBackendType, StoreError,
};
