//! Per-client rate limiting for the HTTP endpoints.
//!
//! - [`bucket`]: token bucket arithmetic
//! - [`limiter`]: keyed buckets with LRU eviction and idle sweep
//! - [`client_ip`]: choosing the key for a request
//! - [`middleware`]: the axum layer producing `429` responses

pub mod bucket;
pub mod client_ip;
pub mod limiter;
pub mod middleware;

pub use bucket::TokenBucket;
pub use client_ip::{UNKNOWN_CLIENT, client_key, forwarded_client_ip};
pub use limiter::{
    CLEANUP_INTERVAL, DEFAULT_BURST, DEFAULT_MAX_SIZE, DEFAULT_REQUESTS_PER_SECOND, DEFAULT_TTL,
    RateLimitConfig, RateLimiter,
};
pub use middleware::{RateLimitState, rate_limit};
