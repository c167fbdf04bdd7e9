//! Per-key token-bucket rate limiter with bounded, LRU-evicted state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::bucket::TokenBucket;

/// Default sustained rate per key.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;

/// Default bucket size per key.
pub const DEFAULT_BURST: u32 = 20;

/// Default cap on tracked keys.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Default idle time after which a key's state is dropped.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// How often the background sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiter tuning.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
    pub max_size: usize,
    pub ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
        }
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        RateLimitConfig {
            requests_per_second,
            burst,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Entry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Independent token bucket per key.
///
/// At most `max_size` keys are tracked; inserting a new key at capacity
/// first evicts the key with the oldest `last_seen`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_size: config.max_size.max(1),
            ..config
        };
        RateLimiter {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `key` and reports whether it is admitted.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let burst = f64::from(self.config.burst);
        let mut entries = self.entries.lock();

        if !entries.contains_key(key) && entries.len() >= self.config.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(evicted = %oldest, "Rate limiter full, evicting least recently seen key");
                entries.remove(&oldest);
            }
        }

        let entry = entries.entry(key.to_owned()).or_insert_with(|| Entry {
            bucket: TokenBucket::full(burst, now),
            last_seen: now,
        });
        entry.last_seen = now;
        entry
            .bucket
            .try_take(self.config.requests_per_second, burst, now)
    }

    /// Drops every key idle for longer than the TTL. Returns how many were
    /// removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    pub fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let victims: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > self.config.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            entries.remove(key);
        }
        victims.len()
    }

    /// Runs [`cleanup_expired`](Self::cleanup_expired) every `interval`
    /// until `shutdown` fires.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.cleanup_expired();
                        if removed > 0 {
                            debug!(removed, remaining = limiter.len(), "Swept idle rate limiter keys");
                        }
                    }
                }
            }
            debug!("Rate limiter cleanup stopped");
        })
    }

    /// Configured sustained rate.
    pub fn requests_per_second(&self) -> f64 {
        self.config.requests_per_second
    }

    pub fn burst(&self) -> u32 {
        self.config.burst
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: f64, burst: u32, max_size: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_second: rate,
            burst,
            max_size,
            ttl: Duration::from_secs(60),
        })
    }

    #[test]
    fn burst_then_reject() {
        let limiter = limiter(1.0, 2, 10);
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));
        assert!(limiter.allow_at("10.0.0.1", t0));
        assert!(!limiter.allow_at("10.0.0.1", t0 + Duration::from_millis(100)));
        assert!(limiter.allow_at("10.0.0.1", t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1.0, 1, 10);
        let t0 = Instant::now();
        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0));
        assert!(limiter.allow_at("b", t0));
    }

    #[test]
    fn evicts_least_recently_seen_at_capacity() {
        let limiter = limiter(1.0, 1, 2);
        let t0 = Instant::now();
        limiter.allow_at("old", t0);
        limiter.allow_at("new", t0 + Duration::from_secs(1));
        limiter.allow_at("newest", t0 + Duration::from_secs(2));

        assert_eq!(limiter.len(), 2);
        assert!(!limiter.contains("old"));
        assert!(limiter.contains("new"));
        assert!(limiter.contains("newest"));
    }

    #[test]
    fn repeat_key_at_capacity_does_not_evict() {
        let limiter = limiter(1.0, 5, 2);
        let t0 = Instant::now();
        limiter.allow_at("a", t0);
        limiter.allow_at("b", t0 + Duration::from_secs(1));
        limiter.allow_at("a", t0 + Duration::from_secs(2));
        assert!(limiter.contains("a"));
        assert!(limiter.contains("b"));
    }

    #[test]
    fn evicted_key_starts_with_a_full_bucket() {
        let limiter = limiter(0.001, 1, 1);
        let t0 = Instant::now();
        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0));
        assert!(limiter.allow_at("b", t0));
        assert!(limiter.allow_at("a", t0));
    }

    #[test]
    fn cleanup_removes_only_idle_keys() {
        let limiter = limiter(1.0, 1, 10);
        let t0 = Instant::now();
        limiter.allow_at("idle", t0);
        limiter.allow_at("active", t0 + Duration::from_secs(90));

        let removed = limiter.cleanup_expired_at(t0 + Duration::from_secs(100));
        assert_eq!(removed, 1);
        assert!(!limiter.contains("idle"));
        assert!(limiter.contains("active"));
    }

    #[test]
    fn zero_max_size_is_clamped() {
        let limiter = limiter(1.0, 1, 0);
        assert!(limiter.allow("only"));
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_cleanup_stops_on_shutdown() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            ttl: Duration::ZERO,
            ..RateLimitConfig::default()
        }));
        let shutdown = CancellationToken::new();
        let handle = limiter.spawn_cleanup(Duration::from_secs(60), shutdown.clone());

        limiter.allow("10.0.0.1");
        std::thread::sleep(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(limiter.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
