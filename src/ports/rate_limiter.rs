//! Rate limiter port.

use async_trait::async_trait;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request may proceed.
    Allowed,
    /// The request is over the limit.
    Denied { retry_after_secs: u32 },
}

impl RateLimitDecision {
    /// True when the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Port for rate limiting. Keys are caller-chosen strings; the edge uses
/// the api key, the ingest path uses `(user_id, session_id)`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Checks and consumes one unit for `key`.
    async fn check(&self, key: &str) -> RateLimitDecision;
}
