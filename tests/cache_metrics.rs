//! Cache gauge tracking
//!
//! Kept in its own test binary: the gauge is process-global, so no other
//! cache may run alongside these assertions.

use quota_service::metrics::CACHE_ENTRIES;
use quota_service::ratelimit::{now_millis, CounterCache, MemoryCache, RateLimitEntry};

#[test]
fn test_cache_gauge_follows_set_and_delete() {
    let cache = MemoryCache::new();
    let now = now_millis();

    cache.set("rate_limit:a", RateLimitEntry::start(now, 60_000)).unwrap();
    cache.set("rate_limit:b", RateLimitEntry::start(now, 60_000)).unwrap();
    assert_eq!(CACHE_ENTRIES.get(), 2);

    // Overwriting a key keeps the count
    cache.set("rate_limit:a", RateLimitEntry::start(now, 30_000)).unwrap();
    assert_eq!(CACHE_ENTRIES.get(), 2);

    cache.delete("rate_limit:a").unwrap();
    assert_eq!(CACHE_ENTRIES.get(), 1);

    // Expired entry evicted on read
    assert!(cache.get("rate_limit:b", now + 60_001).unwrap().is_none());
    assert_eq!(CACHE_ENTRIES.get(), 0);
}
