//! PostgreSQL implementation of AgreementStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{BusinessId, DomainError, Timestamp};
use crate::domain::tenant::{AgreementStatus, DataSharingAgreement, SharingLevel};
use crate::ports::AgreementStore;

use super::with_retry;

/// PostgreSQL-backed data-sharing agreements.
#[derive(Clone)]
pub struct PostgresAgreementStore {
    pool: PgPool,
}

impl PostgresAgreementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_to_str(status: AgreementStatus) -> &'static str {
    match status {
        AgreementStatus::Pending => "pending",
        AgreementStatus::Active => "active",
        AgreementStatus::Revoked => "revoked",
    }
}

fn row_to_agreement(row: &sqlx::postgres::PgRow) -> Result<DataSharingAgreement, DomainError> {
    let sharing_level: String = row.get("sharing_level");
    let status: String = row.get("status");
    let permissions: serde_json::Value = row.get("permissions");
    let initiated_at: chrono::DateTime<chrono::Utc> = row.get("initiated_at");

    Ok(DataSharingAgreement {
        agreement_id: row.get("agreement_id"),
        from_business_id: BusinessId::new(row.get::<String, _>("from_business_id"))?,
        to_business_id: BusinessId::new(row.get::<String, _>("to_business_id"))?,
        sharing_level: match sharing_level.as_str() {
            "full" => SharingLevel::Full,
            _ => SharingLevel::Aggregate,
        },
        permissions: serde_json::from_value(permissions).unwrap_or_default(),
        status: match status.as_str() {
            "active" => AgreementStatus::Active,
            "revoked" => AgreementStatus::Revoked,
            _ => AgreementStatus::Pending,
        },
        initiated_at: Timestamp::from_datetime(initiated_at),
    })
}

#[async_trait]
impl AgreementStore for PostgresAgreementStore {
    async fn insert(&self, agreement: &DataSharingAgreement) -> Result<(), DomainError> {
        let permissions = serde_json::to_value(&agreement.permissions)
            .map_err(|e| DomainError::storage_unavailable(format!("permissions encode: {e}")))?;

        with_retry("insert agreement", || {
            let pool = self.pool.clone();
            let a = agreement.clone();
            let permissions = permissions.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO data_sharing_agreements (
                        agreement_id, from_business_id, to_business_id,
                        sharing_level, permissions, status, initiated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (agreement_id) DO UPDATE
                    SET sharing_level = EXCLUDED.sharing_level,
                        permissions = EXCLUDED.permissions,
                        status = EXCLUDED.status
                    "#,
                )
                .bind(&a.agreement_id)
                .bind(a.from_business_id.as_str())
                .bind(a.to_business_id.as_str())
                .bind(match a.sharing_level {
                    SharingLevel::Aggregate => "aggregate",
                    SharingLevel::Full => "full",
                })
                .bind(permissions)
                .bind(status_to_str(a.status))
                .bind(a.initiated_at.as_datetime())
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
        status: Option<AgreementStatus>,
    ) -> Result<Vec<DataSharingAgreement>, DomainError> {
        let rows = with_retry("list agreements", || {
            let pool = self.pool.clone();
            let business = business_id.as_str().to_string();
            let status_str = status.map(status_to_str);
            async move {
                sqlx::query(
                    r#"
                    SELECT * FROM data_sharing_agreements
                    WHERE (from_business_id = $1 OR to_business_id = $1)
                      AND ($2::text IS NULL OR status = $2)
                    ORDER BY initiated_at DESC
                    "#,
                )
                .bind(business)
                .bind(status_str)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        rows.iter().map(row_to_agreement).collect()
    }
}
