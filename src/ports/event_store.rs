//! Event store port.

use async_trait::async_trait;

use crate::domain::events::Event;
use crate::domain::foundation::{BusinessId, DomainError, UserId};

/// Result of a batch insert: which indices the store rejected, and why.
/// An empty report means the whole batch landed.
#[derive(Debug, Clone, Default)]
pub struct EventInsertReport {
    pub rejected: Vec<(usize, String)>,
}

impl EventInsertReport {
    /// True when every event in the batch was persisted.
    pub fn all_accepted(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Port for the append-only event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch atomically; per-index rejections are reported
    /// rather than failing the whole call.
    async fn insert_batch(&self, events: &[Event]) -> Result<EventInsertReport, DomainError>;

    /// Up to `limit` most recent events for a user within the last
    /// `window_secs`, newest-first.
    async fn recent(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
        window_secs: i64,
    ) -> Result<Vec<Event>, DomainError>;

    /// A user's full journey, oldest-first, capped at `limit`.
    async fn journey(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Event>, DomainError>;

    /// Total events stored for a tenant.
    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError>;
}
