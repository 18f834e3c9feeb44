//! Event ingestion: validation, throttling, quota, and the write queue.
//!
//! The request path never awaits storage. Accepted events go onto a
//! bounded queue drained by a background writer task; high-frequency
//! events pass a per-(user, session) token bucket and the throttle gate
//! first, and are the first shed when the queue runs past its watermark.
//! Admitted high-frequency events are held briefly so that occurrences
//! suppressed inside the throttle interval fold into the single stored
//! event's `coalesced_count`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::config::LimitsConfig;
use crate::domain::events::{
    Event, EventName, ThrottleDecision, ThrottleGate, COALESCED_COUNT_PROPERTY,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, GlobalUid, SessionId, Timestamp, UserId,
};
use crate::domain::tenant::Business;
use crate::ports::{BusinessStore, EventStore, RateLimiter};

/// Writer wake-up cadence.
const WRITER_TICK_MS: u64 = 50;

/// Gate-state eviction horizon.
const GATE_EVICTION_SECS: i64 = 3_600;

/// One event as submitted by the client.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub event_name: String,
    pub component_id: Option<String>,
    pub properties: Map<String, Value>,
    pub timestamp: Option<Timestamp>,
}

/// Per-index outcome of an ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum EventStatus {
    /// Will be persisted.
    Accepted,
    /// Folded into a previously admitted event of the same name.
    Coalesced,
    /// Shed by rate limiting or queue back-pressure.
    Dropped,
    /// Rejected: monthly quota ran out mid-batch.
    QuotaExceeded,
    /// Rejected: malformed (unknown event name).
    Invalid(String),
}

/// Outcome of one ingest call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub statuses: Vec<EventStatus>,
    pub accepted: usize,
    pub coalesced: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PendingKey {
    business_id: crate::domain::foundation::BusinessId,
    user_id: UserId,
    session_id: SessionId,
    event_name: EventName,
}

#[derive(Debug, Clone)]
struct PendingEvent {
    event: Event,
    admitted_at: Timestamp,
}

struct Inner {
    events: Arc<dyn EventStore>,
    gate: Mutex<ThrottleGate>,
    pending: Mutex<HashMap<PendingKey, PendingEvent>>,
    tx: mpsc::Sender<Event>,
    queue_capacity: usize,
    queue_watermark: usize,
    hf_limiter: Arc<dyn RateLimiter>,
}

impl Inner {
    fn queue_depth(&self) -> usize {
        self.queue_capacity.saturating_sub(self.tx.capacity())
    }

    /// Moves pending events whose throttle interval has elapsed onto the
    /// write queue.
    async fn take_due_pending(&self, now: Timestamp) -> Vec<Event> {
        let mut pending = self.pending.lock().await;
        let mut due = Vec::new();

        pending.retain(|key, entry| {
            let interval = key
                .event_name
                .min_interval()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            if now.secs_since(&entry.admitted_at) >= interval {
                due.push(entry.event.clone());
                false
            } else {
                true
            }
        });
        due
    }

    async fn take_all_pending(&self) -> Vec<Event> {
        let mut pending = self.pending.lock().await;
        pending.drain().map(|(_, entry)| entry.event).collect()
    }
}

/// The ingest pipeline plus its background writer.
pub struct EventIngestor {
    inner: Arc<Inner>,
    businesses: Arc<dyn BusinessStore>,
}

impl EventIngestor {
    /// Builds the ingestor and spawns its writer task.
    pub fn spawn(
        events: Arc<dyn EventStore>,
        businesses: Arc<dyn BusinessStore>,
        limits: &LimitsConfig,
        hf_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(limits.ingest_queue_capacity);
        let inner = Arc::new(Inner {
            events,
            gate: Mutex::new(ThrottleGate::new()),
            pending: Mutex::new(HashMap::new()),
            tx,
            queue_capacity: limits.ingest_queue_capacity,
            queue_watermark: limits.ingest_queue_watermark,
            hf_limiter,
        });

        tokio::spawn(writer_loop(inner.clone(), rx));

        Self { inner, businesses }
    }

    /// Ingests a batch for one (user, session). Returns per-index
    /// statuses; `QuotaExceeded` is an error only when nothing in the
    /// batch fit under the monthly limit.
    pub async fn ingest(
        &self,
        business: &Business,
        user_id: &UserId,
        session_id: &SessionId,
        global_uid: Option<&GlobalUid>,
        items: Vec<IncomingEvent>,
    ) -> Result<IngestOutcome, DomainError> {
        let now = Timestamp::now();
        let mut statuses: Vec<EventStatus> = Vec::with_capacity(items.len());
        // Index into `items` for every entry that will consume quota.
        let mut storable: Vec<(usize, Event, bool)> = Vec::new();

        for (idx, item) in items.into_iter().enumerate() {
            let Some(event_name) = parse_event_name(&item.event_name) else {
                statuses.push(EventStatus::Invalid(format!(
                    "unknown event name '{}'",
                    item.event_name
                )));
                continue;
            };

            let mut event = Event::new(
                business.business_id.clone(),
                user_id.clone(),
                session_id.clone(),
                event_name,
                item.timestamp.unwrap_or(now),
            )
            .with_global_uid(global_uid.cloned());
            if let Some(component) = item.component_id.filter(|c| !c.is_empty()) {
                event = event
                    .with_component(crate::domain::foundation::ComponentId::new(component)?);
            }
            event.properties.extend(item.properties);

            if event_name.is_high_frequency() {
                // Per-(user, session) bucket for the noisy set.
                let bucket_key = format!("{}:{}:{}", business.business_id, user_id, session_id);
                if !self.inner.hf_limiter.check(&bucket_key).await.is_allowed() {
                    statuses.push(EventStatus::Dropped);
                    continue;
                }

                // Shed the noisy set first under queue pressure.
                if self.inner.queue_depth() > self.inner.queue_watermark {
                    statuses.push(EventStatus::Dropped);
                    continue;
                }

                let decision = self.inner.gate.lock().await.offer(
                    &business.business_id,
                    user_id,
                    session_id,
                    event_name,
                    event.timestamp,
                );
                match decision {
                    ThrottleDecision::Admit => {
                        statuses.push(EventStatus::Accepted);
                        storable.push((idx, event, true));
                    }
                    ThrottleDecision::Coalesce { .. } => {
                        self.fold_into_pending(business, user_id, session_id, event_name)
                            .await;
                        statuses.push(EventStatus::Coalesced);
                    }
                }
            } else {
                statuses.push(EventStatus::Accepted);
                storable.push((idx, event, false));
            }
        }

        // Quota gates everything that would be stored.
        let granted = if storable.is_empty() {
            0
        } else {
            let outcome = self
                .businesses
                .consume_quota(&business.business_id, storable.len() as u64)
                .await?;
            if outcome.is_exhausted() {
                return Err(DomainError::new(
                    ErrorCode::QuotaExceeded,
                    "monthly event limit reached",
                ));
            }
            outcome.granted
        };

        for (n, (idx, event, is_high_frequency)) in storable.into_iter().enumerate() {
            if (n as u64) >= granted {
                statuses[idx] = EventStatus::QuotaExceeded;
                continue;
            }
            if is_high_frequency {
                self.stash_pending(event).await;
            } else if self.inner.tx.try_send(event).is_err() {
                // Queue full: shed rather than block.
                statuses[idx] = EventStatus::Dropped;
            }
        }

        let mut gate = self.inner.gate.lock().await;
        gate.evict_older_than(now, GATE_EVICTION_SECS);
        drop(gate);

        Ok(tally(statuses))
    }

    /// Persists a single synthetic context event immediately, outside the
    /// queue and the quota. Used by the optimize pipeline, which must see
    /// its own `component_viewed` event in the aggregation read.
    pub async fn record_context_event(&self, event: Event) -> Result<(), DomainError> {
        self.inner.events.insert_batch(&[event]).await.map(|_| ())
    }

    /// Current write-queue depth (observability and tests).
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth()
    }

    /// Forces all held high-frequency events onto the queue (tests and
    /// shutdown).
    pub async fn flush_pending(&self) {
        for event in self.inner.take_all_pending().await {
            let _ = self.inner.tx.try_send(event);
        }
    }

    async fn stash_pending(&self, mut event: Event) {
        let key = PendingKey {
            business_id: event.business_id.clone(),
            user_id: event.user_id.clone(),
            session_id: event.session_id.clone(),
            event_name: event.event_name,
        };
        event
            .properties
            .insert(COALESCED_COUNT_PROPERTY.to_string(), Value::from(1));
        let admitted_at = event.timestamp;
        self.inner
            .pending
            .lock()
            .await
            .insert(key, PendingEvent { event, admitted_at });
    }

    async fn fold_into_pending(
        &self,
        business: &Business,
        user_id: &UserId,
        session_id: &SessionId,
        event_name: EventName,
    ) {
        let key = PendingKey {
            business_id: business.business_id.clone(),
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            event_name,
        };
        let mut pending = self.inner.pending.lock().await;
        if let Some(entry) = pending.get_mut(&key) {
            let count = entry.event.coalesced_count() + 1;
            entry
                .event
                .properties
                .insert(COALESCED_COUNT_PROPERTY.to_string(), Value::from(count));
        }
        // A fold with no pending entry means the carrier already flushed;
        // the occurrence merges into nothing and is dropped, which is the
        // throttle contract.
    }
}

async fn writer_loop(inner: Arc<Inner>, mut rx: mpsc::Receiver<Event>) {
    let tick = std::time::Duration::from_millis(WRITER_TICK_MS);

    loop {
        tokio::time::sleep(tick).await;

        let mut batch: Vec<Event> = Vec::new();
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
        }
        batch.extend(inner.take_due_pending(Timestamp::now()).await);

        if batch.is_empty() {
            continue;
        }

        match inner.events.insert_batch(&batch).await {
            Ok(report) if !report.all_accepted() => {
                tracing::warn!(
                    rejected = report.rejected.len(),
                    "event store rejected part of a batch"
                );
            }
            Ok(_) => {}
            Err(e) => {
                // At-most-once delivery: the batch is lost, not re-queued.
                tracing::error!(error = %e, dropped = batch.len(), "event batch write failed");
            }
        }
    }
}

fn parse_event_name(raw: &str) -> Option<EventName> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

fn tally(statuses: Vec<EventStatus>) -> IngestOutcome {
    let accepted = statuses
        .iter()
        .filter(|s| matches!(s, EventStatus::Accepted))
        .count();
    let coalesced = statuses
        .iter()
        .filter(|s| matches!(s, EventStatus::Coalesced))
        .count();
    let dropped = statuses
        .iter()
        .filter(|s| matches!(s, EventStatus::Dropped | EventStatus::QuotaExceeded))
        .count();

    IngestOutcome {
        statuses,
        accepted,
        coalesced,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBusinessStore, InMemoryEventStore};
    use crate::adapters::rate_limiter::TokenBucketLimiter;
    use crate::domain::tenant::BusinessTier;

    fn incoming(name: &str) -> IncomingEvent {
        IncomingEvent {
            event_name: name.to_string(),
            component_id: None,
            properties: Map::new(),
            timestamp: None,
        }
    }

    struct Fixture {
        ingestor: EventIngestor,
        events: Arc<InMemoryEventStore>,
        businesses: Arc<InMemoryBusinessStore>,
        business: Business,
    }

    async fn fixture() -> Fixture {
        fixture_with_limits(LimitsConfig::default()).await
    }

    async fn fixture_with_limits(limits: LimitsConfig) -> Fixture {
        let events = Arc::new(InMemoryEventStore::new());
        let businesses = Arc::new(InMemoryBusinessStore::new());
        let business = Business::register("Shoes", "shoes.test", vec![], BusinessTier::Free);
        businesses.insert(&business).await.unwrap();

        let hf_limiter = Arc::new(TokenBucketLimiter::new(
            limits.high_frequency_per_second,
            limits.high_frequency_per_second * 2,
        ));
        let ingestor = EventIngestor::spawn(
            events.clone(),
            businesses.clone(),
            &limits,
            hf_limiter,
        );
        Fixture {
            ingestor,
            events,
            businesses,
            business,
        }
    }

    async fn settle(fx: &Fixture) {
        fx.ingestor.flush_pending().await;
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    }

    fn ids() -> (UserId, SessionId) {
        (
            UserId::new("user_1").unwrap(),
            SessionId::new("session_1").unwrap(),
        )
    }

    #[tokio::test]
    async fn plain_events_are_accepted_and_persisted() {
        let fx = fixture().await;
        let (user, session) = ids();

        let outcome = fx
            .ingestor
            .ingest(
                &fx.business,
                &user,
                &session,
                None,
                vec![incoming("click"), incoming("page_viewed")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.dropped, 0);

        settle(&fx).await;
        assert_eq!(fx.events.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_event_names_are_invalid_per_index() {
        let fx = fixture().await;
        let (user, session) = ids();

        let outcome = fx
            .ingestor
            .ingest(
                &fx.business,
                &user,
                &session,
                None,
                vec![incoming("click"), incoming("telepathy")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 1);
        assert!(matches!(outcome.statuses[1], EventStatus::Invalid(_)));
    }

    #[tokio::test]
    async fn hesitation_burst_collapses_to_one_stored_event() {
        let fx = fixture().await;
        let (user, session) = ids();

        // 20 mouse_hesitation events in one request: 1 admitted, 19 folded
        let items: Vec<IncomingEvent> =
            (0..20).map(|_| incoming("mouse_hesitation")).collect();
        let outcome = fx
            .ingestor
            .ingest(&fx.business, &user, &session, None, items)
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.coalesced, 19);

        settle(&fx).await;
        let stored = fx.events.session_events(&user).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].coalesced_count(), 20);
    }

    #[tokio::test]
    async fn quota_exhaustion_rejects_without_counting() {
        let fx = fixture().await;
        let (user, session) = ids();

        let mut at_limit = fx.business.clone();
        at_limit.monthly_events_used = at_limit.monthly_event_limit.unwrap();
        fx.businesses.seed(at_limit.clone()).await;

        let err = fx
            .ingestor
            .ingest(&at_limit, &user, &session, None, vec![incoming("click")])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::QuotaExceeded);

        let after = fx
            .businesses
            .find_by_id(&at_limit.business_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.monthly_events_used, after.monthly_event_limit.unwrap());
    }

    #[tokio::test]
    async fn partial_quota_marks_the_excess() {
        let fx = fixture().await;
        let (user, session) = ids();

        let mut nearly_full = fx.business.clone();
        nearly_full.monthly_events_used = nearly_full.monthly_event_limit.unwrap() - 1;
        fx.businesses.seed(nearly_full.clone()).await;

        let outcome = fx
            .ingestor
            .ingest(
                &nearly_full,
                &user,
                &session,
                None,
                vec![incoming("click"), incoming("page_viewed")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.statuses[0], EventStatus::Accepted);
        assert_eq!(outcome.statuses[1], EventStatus::QuotaExceeded);
    }

    #[tokio::test]
    async fn context_events_bypass_queue_and_quota() {
        let fx = fixture().await;
        let (user, session) = ids();

        let event = Event::new(
            fx.business.business_id.clone(),
            user.clone(),
            session,
            EventName::ComponentViewed,
            Timestamp::now(),
        );
        fx.ingestor.record_context_event(event).await.unwrap();

        // Visible immediately, and no quota consumed
        assert_eq!(fx.events.len().await, 1);
        let after = fx
            .businesses
            .find_by_id(&fx.business.business_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.monthly_events_used, 0);
    }

    #[tokio::test]
    async fn timestamps_default_to_receipt_time() {
        let fx = fixture().await;
        let (user, session) = ids();
        let before = Timestamp::now();

        fx.ingestor
            .ingest(&fx.business, &user, &session, None, vec![incoming("click")])
            .await
            .unwrap();
        settle(&fx).await;

        let stored = fx.events.session_events(&user).await;
        assert!(!stored[0].timestamp.is_before(&before));
    }
}
