//! Business (tenant) store port.

use async_trait::async_trait;

use crate::domain::foundation::{BusinessId, DomainError};
use crate::domain::tenant::Business;

/// Outcome of an atomic quota consumption attempt. `granted` is how much
/// of the request fit under the monthly limit; the usage counter never
/// exceeds the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaOutcome {
    pub granted: u64,
}

impl QuotaOutcome {
    /// True when nothing could be consumed.
    pub fn is_exhausted(&self) -> bool {
        self.granted == 0
    }
}

/// Port for tenant records.
#[async_trait]
pub trait BusinessStore: Send + Sync {
    /// Resolves an API key to its active business, if any.
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Business>, DomainError>;

    /// Looks up a business by id.
    async fn find_by_id(&self, business_id: &BusinessId)
        -> Result<Option<Business>, DomainError>;

    /// Registers a new business. The API key index is unique.
    async fn insert(&self, business: &Business) -> Result<(), DomainError>;

    /// Atomically consumes up to `count` events of monthly quota. Grants
    /// the full amount when unlimited, the remaining headroom when the
    /// limit is near, and zero when exhausted.
    async fn consume_quota(
        &self,
        business_id: &BusinessId,
        count: u64,
    ) -> Result<QuotaOutcome, DomainError>;
}
