//! PostgreSQL implementation of EventStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::events::{Event, EventName};
use crate::domain::foundation::{
    BusinessId, DomainError, GlobalUid, SessionId, Timestamp, UserId,
};
use crate::ports::{EventInsertReport, EventStore};

use super::with_retry;

/// PostgreSQL-backed append-only event log.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_name_to_str(name: EventName) -> String {
    serde_json::to_value(name)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Result<Event, DomainError> {
    let name: String = row.get("event_name");
    let event_name: EventName = serde_json::from_value(serde_json::Value::String(name.clone()))
        .map_err(|_| {
            DomainError::validation("event_name", format!("unknown event name '{name}'"))
        })?;
    let properties: serde_json::Value = row.get("properties");
    let global_uid: Option<String> = row.get("global_uid");
    let component_id: Option<String> = row.get("component_id");
    let occurred_at: chrono::DateTime<chrono::Utc> = row.get("occurred_at");

    Ok(Event {
        business_id: BusinessId::new(row.get::<String, _>("business_id"))?,
        user_id: UserId::new(row.get::<String, _>("user_id"))?,
        session_id: SessionId::new(row.get::<String, _>("session_id"))?,
        global_uid: global_uid.map(GlobalUid::new).transpose()?,
        event_name,
        component_id: component_id
            .map(crate::domain::foundation::ComponentId::new)
            .transpose()?,
        properties: properties.as_object().cloned().unwrap_or_default(),
        timestamp: Timestamp::from_datetime(occurred_at),
    })
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert_batch(&self, events: &[Event]) -> Result<EventInsertReport, DomainError> {
        if events.is_empty() {
            return Ok(EventInsertReport::default());
        }

        // One transaction per batch: the batch lands atomically, in
        // timestamp order.
        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);

        with_retry("insert event batch", || {
            let pool = self.pool.clone();
            let batch: Vec<Event> = sorted.iter().map(|e| (*e).clone()).collect();
            async move {
                let mut tx = pool.begin().await?;
                for event in &batch {
                    sqlx::query(
                        r#"
                        INSERT INTO events (
                            business_id, user_id, session_id, global_uid,
                            event_name, component_id, properties, occurred_at
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                        "#,
                    )
                    .bind(event.business_id.as_str())
                    .bind(event.user_id.as_str())
                    .bind(event.session_id.as_str())
                    .bind(event.global_uid.as_ref().map(|g| g.as_str()))
                    .bind(event_name_to_str(event.event_name))
                    .bind(event.component_id.as_ref().map(|c| c.as_str()))
                    .bind(serde_json::Value::Object(event.properties.clone()))
                    .bind(event.timestamp.as_datetime())
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await
            }
        })
        .await?;

        Ok(EventInsertReport::default())
    }

    async fn recent(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
        window_secs: i64,
    ) -> Result<Vec<Event>, DomainError> {
        let rows = with_retry("recent events", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM events
                    WHERE business_id = $1 AND user_id = $2
                      AND occurred_at > now() - make_interval(secs => $3)
                    ORDER BY occurred_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(business)
                .bind(user)
                .bind(window_secs as f64)
                .bind(limit as i64)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn journey(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Event>, DomainError> {
        let rows = with_retry("user journey", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM events
                    WHERE business_id = $1 AND user_id = $2
                    ORDER BY occurred_at ASC, id ASC
                    LIMIT $3
                    "#,
                )
                .bind(business)
                .bind(user)
                .bind(limit as i64)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError> {
        let count: i64 = with_retry("count events", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            async move {
                sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE business_id = $1")
                    .bind(business)
                    .fetch_one(&pool)
                    .await
            }
        })
        .await?;

        Ok(count as u64)
    }
}
