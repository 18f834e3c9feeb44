//! PostgreSQL implementation of UserStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{BusinessId, DomainError, Timestamp, UserId};
use crate::ports::{SessionSnapshot, UserProfile, UserStore};

use super::with_retry;

/// PostgreSQL-backed tenant-scoped user records. Session snapshots are
/// stored as JSONB documents.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> Result<UserProfile, DomainError> {
    let last_session: Option<serde_json::Value> = row.get("last_session");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");

    Ok(UserProfile {
        business_id: BusinessId::new(row.get::<String, _>("business_id"))?,
        user_id: UserId::new(row.get::<String, _>("user_id"))?,
        last_session: last_session
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                DomainError::storage_unavailable(format!("corrupt session snapshot: {e}"))
            })?,
        last_html: row.get("last_html"),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, DomainError> {
        let row = with_retry("find user", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            async move {
                sqlx::query("SELECT * FROM users WHERE business_id = $1 AND user_id = $2")
                    .bind(business)
                    .bind(user)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn upsert_snapshot(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        snapshot: SessionSnapshot,
        last_html: Option<String>,
    ) -> Result<(), DomainError> {
        let snapshot_json = serde_json::to_value(&snapshot)
            .map_err(|e| DomainError::storage_unavailable(format!("snapshot encode: {e}")))?;

        with_retry("upsert user snapshot", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            let snapshot_json = snapshot_json.clone();
            let last_html = last_html.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO users (business_id, user_id, last_session, last_html, updated_at)
                    VALUES ($1, $2, $3, $4, now())
                    ON CONFLICT (business_id, user_id) DO UPDATE
                    SET last_session = EXCLUDED.last_session,
                        last_html = COALESCE(EXCLUDED.last_html, users.last_html),
                        updated_at = now()
                    "#,
                )
                .bind(business)
                .bind(user)
                .bind(snapshot_json)
                .bind(last_html)
                .execute(&pool)
                .await
            }
        })
        .await?;
        Ok(())
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<UserProfile>, DomainError> {
        let rows = with_retry("list users", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            async move {
                sqlx::query("SELECT * FROM users WHERE business_id = $1 ORDER BY user_id")
                    .bind(business)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError> {
        let count: i64 = with_retry("count users", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            async move {
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE business_id = $1")
                    .bind(business)
                    .fetch_one(&pool)
                    .await
            }
        })
        .await?;

        Ok(count as u64)
    }
}
