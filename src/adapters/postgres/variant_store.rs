//! PostgreSQL implementation of VariantStore.
//!
//! Slots live as typed columns so compare-and-set is a single conditional
//! UPDATE; history rides along as a JSONB array. The regeneration lock is a
//! TTL column on the record itself.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{BusinessId, ComponentId, DomainError, UserId};
use crate::domain::variants::{
    ArchivedVariant, SlotLabel, VariantKey, VariantRecord, VariantSlot,
};
use crate::ports::{CasOutcome, VariantStore};

use super::with_retry;

/// Tolerance when comparing stored float scores in CAS guards.
const SCORE_EPSILON: f64 = 1e-9;

/// PostgreSQL-backed variant records.
#[derive(Clone)]
pub struct PostgresVariantStore {
    pool: PgPool,
}

impl PostgresVariantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<VariantRecord, DomainError> {
    let parse_history = |value: serde_json::Value| -> Result<Vec<ArchivedVariant>, DomainError> {
        serde_json::from_value(value).map_err(|e| {
            DomainError::storage_unavailable(format!("corrupt variant history: {e}"))
        })
    };

    Ok(VariantRecord {
        slot_a: VariantSlot {
            current_html: row.get("a_html"),
            current_score: row.get("a_score"),
            number_of_trials: row.get::<i64, _>("a_trials") as u64,
            history: parse_history(row.get("a_history"))?,
        },
        slot_b: VariantSlot {
            current_html: row.get("b_html"),
            current_score: row.get("b_score"),
            number_of_trials: row.get::<i64, _>("b_trials") as u64,
            history: parse_history(row.get("b_history"))?,
        },
    })
}

fn row_to_key(row: &sqlx::postgres::PgRow) -> Result<VariantKey, DomainError> {
    Ok(VariantKey::new(
        BusinessId::new(row.get::<String, _>("business_id"))?,
        UserId::new(row.get::<String, _>("user_id"))?,
        ComponentId::new(row.get::<String, _>("component_id"))?,
    ))
}

fn slot_columns(slot: SlotLabel) -> (&'static str, &'static str, &'static str) {
    match slot {
        SlotLabel::A => ("a_html", "a_score", "a_trials"),
        SlotLabel::B => ("b_html", "b_score", "b_trials"),
    }
}

#[async_trait]
impl VariantStore for PostgresVariantStore {
    async fn get_or_init(
        &self,
        key: &VariantKey,
        seed_html: &str,
    ) -> Result<VariantRecord, DomainError> {
        // Insert-if-absent then read back: idempotent under races because
        // the conflict target is the primary key.
        let row = with_retry("get or init variant", || {
            let pool = self.pool.clone();
            let key = key.clone();
            let seed = seed_html.to_string();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO variants (
                        business_id, user_id, component_id,
                        a_html, b_html
                    ) VALUES ($1, $2, $3, $4, $4)
                    ON CONFLICT (business_id, user_id, component_id) DO NOTHING
                    "#,
                )
                .bind(key.business_id.as_str())
                .bind(key.user_id.as_str())
                .bind(key.component_id.as_str())
                .bind(seed)
                .execute(&pool)
                .await?;

                sqlx::query(
                    r#"
                    SELECT * FROM variants
                    WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                    "#,
                )
                .bind(key.business_id.as_str())
                .bind(key.user_id.as_str())
                .bind(key.component_id.as_str())
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        row_to_record(&row)
    }

    async fn get(&self, key: &VariantKey) -> Result<Option<VariantRecord>, DomainError> {
        let row = with_retry("get variant", || {
            let pool = self.pool.clone();
            let key = key.clone();
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM variants
                    WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                    "#,
                )
                .bind(key.business_id.as_str())
                .bind(key.user_id.as_str())
                .bind(key.component_id.as_str())
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn update_slot(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        expected: (f64, u64),
        new_score: f64,
        new_trials: u64,
    ) -> Result<CasOutcome, DomainError> {
        let (_, score_col, trials_col) = slot_columns(slot);

        let result = with_retry("cas slot update", || {
            let pool = self.pool.clone();
            let key = key.clone();
            let sql = format!(
                r#"
                UPDATE variants
                SET {score_col} = $4, {trials_col} = $5
                WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                  AND abs({score_col} - $6) < {SCORE_EPSILON}
                  AND {trials_col} = $7
                "#
            );
            async move {
                sqlx::query(&sql)
                    .bind(key.business_id.as_str())
                    .bind(key.user_id.as_str())
                    .bind(key.component_id.as_str())
                    .bind(new_score)
                    .bind(new_trials as i64)
                    .bind(expected.0)
                    .bind(expected.1 as i64)
                    .execute(&pool)
                    .await
            }
        })
        .await?;

        if result.rows_affected() > 0 {
            return Ok(CasOutcome::Committed);
        }

        // Lost the race: hand back the authoritative record.
        let current = self.get(key).await?.ok_or_else(|| {
            DomainError::new(
                crate::domain::foundation::ErrorCode::VariantNotFound,
                format!("{key}"),
            )
        })?;
        Ok(CasOutcome::Conflict { current })
    }

    async fn replace_html(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        new_html: &str,
        archive: ArchivedVariant,
    ) -> Result<(), DomainError> {
        let (html_col, score_col, trials_col) = slot_columns(slot);
        let history_col = match slot {
            SlotLabel::A => "a_history",
            SlotLabel::B => "b_history",
        };
        let archive_json = serde_json::to_value(&archive)
            .map_err(|e| DomainError::storage_unavailable(format!("archive encode: {e}")))?;

        with_retry("replace variant html", || {
            let pool = self.pool.clone();
            let key = key.clone();
            let html = new_html.to_string();
            let archive_json = archive_json.clone();
            let sql = format!(
                r#"
                UPDATE variants
                SET {html_col} = $4,
                    {score_col} = 0,
                    {trials_col} = 0,
                    {history_col} = {history_col} || $5::jsonb
                WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                "#
            );
            async move {
                sqlx::query(&sql)
                    .bind(key.business_id.as_str())
                    .bind(key.user_id.as_str())
                    .bind(key.component_id.as_str())
                    .bind(html)
                    .bind(archive_json)
                    .execute(&pool)
                    .await
            }
        })
        .await?;
        Ok(())
    }

    async fn try_acquire_regeneration_lock(
        &self,
        key: &VariantKey,
        ttl_secs: i64,
    ) -> Result<bool, DomainError> {
        let result = with_retry("acquire regeneration lock", || {
            let pool = self.pool.clone();
            let key = key.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE variants
                    SET regen_lock_expires_at = now() + make_interval(secs => $4)
                    WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                      AND (regen_lock_expires_at IS NULL OR regen_lock_expires_at < now())
                    "#,
                )
                .bind(key.business_id.as_str())
                .bind(key.user_id.as_str())
                .bind(key.component_id.as_str())
                .bind(ttl_secs as f64)
                .execute(&pool)
                .await
            }
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_regeneration_lock(&self, key: &VariantKey) -> Result<(), DomainError> {
        with_retry("release regeneration lock", || {
            let pool = self.pool.clone();
            let key = key.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE variants
                    SET regen_lock_expires_at = NULL
                    WHERE business_id = $1 AND user_id = $2 AND component_id = $3
                    "#,
                )
                .bind(key.business_id.as_str())
                .bind(key.user_id.as_str())
                .bind(key.component_id.as_str())
                .execute(&pool)
                .await
            }
        })
        .await?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError> {
        let rows = with_retry("list variants for user", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let user = user_id.as_str().to_string();
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM variants
                    WHERE business_id = $1 AND user_id = $2
                    ORDER BY component_id
                    "#,
                )
                .bind(business)
                .bind(user)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        rows.iter()
            .map(|row| Ok((row_to_key(row)?, row_to_record(row)?)))
            .collect()
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError> {
        let rows = with_retry("list variants for business", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM variants
                    WHERE business_id = $1
                    ORDER BY user_id, component_id
                    "#,
                )
                .bind(business)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        rows.iter()
            .map(|row| Ok((row_to_key(row)?, row_to_record(row)?)))
            .collect()
    }
}
