//! In-memory event store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::events::Event;
use crate::domain::foundation::{BusinessId, DomainError, Timestamp, UserId};
use crate::ports::{EventInsertReport, EventStore};

/// Append-only in-memory event log. Events are kept in insertion order;
/// reads sort by timestamp, which preserves the tie-break-by-insertion
/// ordering guarantee.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored events (test introspection).
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// All events for one session, in stored order (test introspection).
    pub async fn session_events(&self, user_id: &UserId) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_batch(&self, events: &[Event]) -> Result<EventInsertReport, DomainError> {
        let mut log = self.events.write().await;
        let mut batch: Vec<Event> = events.to_vec();
        // Stable sort keeps submission order for equal timestamps
        batch.sort_by_key(|e| e.timestamp);
        log.extend(batch);
        Ok(EventInsertReport::default())
    }

    async fn recent(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
        window_secs: i64,
    ) -> Result<Vec<Event>, DomainError> {
        let cutoff = Timestamp::now().minus_secs(window_secs);
        let log = self.events.read().await;

        let mut matched: Vec<Event> = log
            .iter()
            .filter(|e| {
                &e.business_id == business_id
                    && &e.user_id == user_id
                    && e.timestamp.is_after(&cutoff)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn journey(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Event>, DomainError> {
        let log = self.events.read().await;
        let mut matched: Vec<Event> = log
            .iter()
            .filter(|e| &e.business_id == business_id && &e.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError> {
        let log = self.events.read().await;
        Ok(log.iter().filter(|e| &e.business_id == business_id).count() as u64)
    }
}
