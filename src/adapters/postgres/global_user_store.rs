//! PostgreSQL implementation of GlobalUserStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{BusinessId, DomainError, GlobalUid, Timestamp, UserId};
use crate::domain::tenant::GlobalUser;
use crate::ports::GlobalUserStore;

use super::with_retry;

/// PostgreSQL-backed cross-site identities. The (business -> local uid)
/// membership map is a JSONB document that only ever gains keys.
#[derive(Clone)]
pub struct PostgresGlobalUserStore {
    pool: PgPool,
}

impl PostgresGlobalUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_global_user(row: &sqlx::postgres::PgRow) -> Result<GlobalUser, DomainError> {
    let business_uids: serde_json::Value = row.get("business_uids");
    let first_seen: chrono::DateTime<chrono::Utc> = row.get("first_seen");
    let last_seen: chrono::DateTime<chrono::Utc> = row.get("last_seen");

    Ok(GlobalUser {
        global_uid: GlobalUid::new(row.get::<String, _>("global_uid"))?,
        business_uids: serde_json::from_value(business_uids).map_err(|e| {
            DomainError::storage_unavailable(format!("corrupt business_uids map: {e}"))
        })?,
        first_seen: Timestamp::from_datetime(first_seen),
        last_seen: Timestamp::from_datetime(last_seen),
    })
}

#[async_trait]
impl GlobalUserStore for PostgresGlobalUserStore {
    async fn find(&self, global_uid: &GlobalUid) -> Result<Option<GlobalUser>, DomainError> {
        let row = with_retry("find global user", || {
            let pool = self.pool.clone();
            let guid = global_uid.as_str().to_string();
            async move {
                sqlx::query("SELECT * FROM global_users WHERE global_uid = $1")
                    .bind(guid)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.as_ref().map(row_to_global_user).transpose()
    }

    async fn link(
        &self,
        global_uid: &GlobalUid,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<GlobalUser, DomainError> {
        let row = with_retry("link global user", || {
            let pool = self.pool.clone();
            let guid = global_uid.as_str().to_string();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO global_users (global_uid, business_uids, first_seen, last_seen)
                    VALUES ($1, jsonb_build_object($2::text, $3::text), now(), now())
                    ON CONFLICT (global_uid) DO UPDATE
                    SET business_uids = global_users.business_uids
                                        || jsonb_build_object($2::text, $3::text),
                        last_seen = now()
                    RETURNING *
                    "#,
                )
                .bind(guid)
                .bind(business)
                .bind(user)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        row_to_global_user(&row)
    }
}
