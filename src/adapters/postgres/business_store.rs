//! PostgreSQL implementation of BusinessStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{BusinessId, DomainError, Timestamp};
use crate::domain::tenant::{Business, BusinessTier};
use crate::ports::{BusinessStore, QuotaOutcome};

use super::with_retry;

/// PostgreSQL-backed tenant registry.
#[derive(Clone)]
pub struct PostgresBusinessStore {
    pool: PgPool,
}

impl PostgresBusinessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn tier_to_str(tier: BusinessTier) -> &'static str {
    match tier {
        BusinessTier::Free => "free",
        BusinessTier::Starter => "starter",
        BusinessTier::Growth => "growth",
        BusinessTier::Enterprise => "enterprise",
    }
}

fn tier_from_str(s: &str) -> BusinessTier {
    match s {
        "starter" => BusinessTier::Starter,
        "growth" => BusinessTier::Growth,
        "enterprise" => BusinessTier::Enterprise,
        _ => BusinessTier::Free,
    }
}

fn row_to_business(row: sqlx::postgres::PgRow) -> Result<Business, DomainError> {
    let business_id: String = row.get("business_id");
    let allowed_domains: Vec<String> = row.get("allowed_domains");
    let partner_ids: Vec<String> = row.get("partner_ids");
    let tier: String = row.get("tier");
    let monthly_event_limit: Option<i64> = row.get("monthly_event_limit");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

    Ok(Business {
        business_id: BusinessId::new(business_id)?,
        name: row.get("name"),
        domain: row.get("domain"),
        allowed_domains: allowed_domains.into_iter().collect(),
        api_key: row.get("api_key"),
        tier: tier_from_str(&tier),
        partner_ids: partner_ids
            .into_iter()
            .map(BusinessId::new)
            .collect::<Result<_, _>>()?,
        monthly_event_limit: monthly_event_limit.map(|l| l as u64),
        monthly_events_used: row.get::<i64, _>("monthly_events_used") as u64,
        is_active: row.get("is_active"),
        created_at: Timestamp::from_datetime(created_at),
    })
}

#[async_trait]
impl BusinessStore for PostgresBusinessStore {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Business>, DomainError> {
        let row = with_retry("find business by api key", || {
            let pool = self.pool.clone();
            let api_key = api_key.to_string();
            async move {
                sqlx::query("SELECT * FROM businesses WHERE api_key = $1 AND is_active")
                    .bind(api_key)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(row_to_business).transpose()
    }

    async fn find_by_id(
        &self,
        business_id: &BusinessId,
    ) -> Result<Option<Business>, DomainError> {
        let row = with_retry("find business by id", || {
            let pool = self.pool.clone();
            let id = business_id.as_str().to_string();
            async move {
                sqlx::query("SELECT * FROM businesses WHERE business_id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(row_to_business).transpose()
    }

    async fn insert(&self, business: &Business) -> Result<(), DomainError> {
        with_retry("insert business", || {
            let pool = self.pool.clone();
            let b = business.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO businesses (
                        business_id, name, domain, allowed_domains, api_key, tier,
                        partner_ids, monthly_event_limit, monthly_events_used,
                        is_active, created_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    "#,
                )
                .bind(b.business_id.as_str())
                .bind(&b.name)
                .bind(&b.domain)
                .bind(b.allowed_domains.iter().cloned().collect::<Vec<_>>())
                .bind(&b.api_key)
                .bind(tier_to_str(b.tier))
                .bind(
                    b.partner_ids
                        .iter()
                        .map(|p| p.as_str().to_string())
                        .collect::<Vec<_>>(),
                )
                .bind(b.monthly_event_limit.map(|l| l as i64))
                .bind(b.monthly_events_used as i64)
                .bind(b.is_active)
                .bind(b.created_at.as_datetime())
                .execute(&pool)
                .await
            }
        })
        .await?;
        Ok(())
    }

    async fn consume_quota(
        &self,
        business_id: &BusinessId,
        count: u64,
    ) -> Result<QuotaOutcome, DomainError> {
        // Single guarded UPDATE keeps check-and-increment atomic; the
        // counter is clamped so usage never exceeds the limit.
        let granted: Option<i64> = with_retry("consume quota", || {
            let pool = self.pool.clone();
            let id = business_id.as_str().to_string();
            async move {
                sqlx::query_scalar(
                    r#"
                    WITH prev AS (
                        SELECT monthly_events_used AS used, monthly_event_limit AS cap
                        FROM businesses WHERE business_id = $1 FOR UPDATE
                    )
                    UPDATE businesses b
                    SET monthly_events_used = CASE
                        WHEN p.cap IS NULL THEN p.used + $2
                        ELSE LEAST(p.used + $2, p.cap)
                    END
                    FROM prev p
                    WHERE b.business_id = $1
                    RETURNING b.monthly_events_used - p.used
                    "#,
                )
                .bind(id)
                .bind(count as i64)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        match granted {
            Some(granted) => Ok(QuotaOutcome {
                granted: granted.max(0) as u64,
            }),
            None => Err(DomainError::new(
                crate::domain::foundation::ErrorCode::BusinessNotFound,
                "unknown business",
            )),
        }
    }
}
