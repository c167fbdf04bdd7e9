//! Token bucket state for a single client key.

use std::time::Instant;

/// Tokens accrue continuously at `rate` per second up to `burst`; each
/// admitted request consumes one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket holding `burst` tokens.
    pub fn full(burst: f64, now: Instant) -> Self {
        TokenBucket {
            tokens: burst,
            last_refill: now,
        }
    }

    /// Refills for the time elapsed since the last call, then tries to take
    /// one token.
    pub fn try_take(&mut self, rate: f64, burst: f64, now: Instant) -> bool {
        self.refill(rate, burst, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (as of the last refill).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, rate: f64, burst: f64, now: Instant) {
        // Out-of-order instants add nothing.
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn starts_full_and_drains() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::full(3.0, t0);
        assert!(bucket.try_take(1.0, 3.0, t0));
        assert!(bucket.try_take(1.0, 3.0, t0));
        assert!(bucket.try_take(1.0, 3.0, t0));
        assert!(!bucket.try_take(1.0, 3.0, t0));
    }

    #[test]
    fn refills_at_rate() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::full(1.0, t0);
        assert!(bucket.try_take(2.0, 1.0, t0));
        assert!(!bucket.try_take(2.0, 1.0, t0 + Duration::from_millis(400)));
        assert!(bucket.try_take(2.0, 1.0, t0 + Duration::from_millis(600)));
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::full(2.0, t0);
        bucket.try_take(1.0, 2.0, t0 + Duration::from_secs(3600));
        assert!((bucket.tokens() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn earlier_instant_adds_nothing() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut bucket = TokenBucket::full(1.0, t0);
        assert!(bucket.try_take(1.0, 1.0, t0));
        assert!(!bucket.try_take(1.0, 1.0, t0 - Duration::from_secs(5)));
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    proptest! {
        /// In any window of length T, at most B + ⌊R·T⌋ requests are admitted.
        #[test]
        fn admitted_requests_bounded_in_every_window(
            rate in 0.1f64..50.0,
            burst in 1u32..30,
            gaps_ms in prop::collection::vec(0u64..400, 1..120),
        ) {
            let burst = f64::from(burst);
            let t0 = Instant::now();
            let mut bucket = TokenBucket::full(burst, t0);

            let mut at = t0;
            let mut log = Vec::with_capacity(gaps_ms.len());
            for gap in gaps_ms {
                at += Duration::from_millis(gap);
                log.push((at, bucket.try_take(rate, burst, at)));
            }

            for i in 0..log.len() {
                for j in i..log.len() {
                    let window = log[j].0.duration_since(log[i].0).as_secs_f64();
                    let admitted = log[i..=j].iter().filter(|(_, ok)| *ok).count() as f64;
                    let bound = (burst + rate * window + 1e-9).floor();
                    prop_assert!(
                        admitted <= bound,
                        "admitted {} > bound {} over {}s", admitted, bound, window
                    );
                }
            }
        }
    }
}
