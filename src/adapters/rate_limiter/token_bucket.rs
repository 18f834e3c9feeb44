//! In-memory token bucket rate limiter.
//!
//! One bucket per key, refilled continuously at the sustained rate up to
//! the burst capacity. Single-process; a multi-node deployment would back
//! this port with a shared store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::ports::{RateLimitDecision, RateLimiter};

/// Token bucket state for one key.
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter with a sustained rate and burst capacity.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rate_per_sec: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    /// Creates a limiter allowing `rate_per_sec` sustained requests with
    /// bursts up to `burst`.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            rate_per_sec: rate_per_sec.max(1) as f64,
            burst: burst.max(1) as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            let deficit = 1.0 - bucket.tokens;
            RateLimitDecision::Denied {
                retry_after_secs: (deficit / self.rate_per_sec).ceil().max(1.0) as u32,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_bursts_up_to_capacity() {
        let limiter = TokenBucketLimiter::new(10, 20);

        for i in 0..20 {
            assert!(
                limiter.check("key").await.is_allowed(),
                "request {i} within burst should pass"
            );
        }
        assert!(!limiter.check("key").await.is_allowed());
    }

    #[tokio::test]
    async fn denial_reports_retry_after() {
        let limiter = TokenBucketLimiter::new(1, 1);
        assert!(limiter.check("key").await.is_allowed());

        match limiter.check("key").await {
            RateLimitDecision::Denied { retry_after_secs } => {
                assert!(retry_after_secs >= 1);
            }
            RateLimitDecision::Allowed => panic!("bucket should be empty"),
        }
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = TokenBucketLimiter::new(1, 1);
        assert!(limiter.check("a").await.is_allowed());
        assert!(limiter.check("b").await.is_allowed());
        assert!(!limiter.check("a").await.is_allowed());
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let limiter = TokenBucketLimiter::new(1000, 1);
        assert!(limiter.check("key").await.is_allowed());
        assert!(!limiter.check("key").await.is_allowed());

        // 1000/s refill: a few milliseconds restores a token
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(limiter.check("key").await.is_allowed());
    }
}
