//! PostgreSQL store implementations.
//!
//! Document-shaped payloads (variant history, session snapshots, event
//! properties) live in JSONB columns; everything queried or indexed is a
//! typed column. Transient faults are retried here with bounded
//! exponential backoff; exhaustion surfaces as `StorageUnavailable`.

mod agreement_store;
mod business_store;
mod event_store;
mod global_user_store;
mod user_store;
mod variant_store;

pub use agreement_store::PostgresAgreementStore;
pub use business_store::PostgresBusinessStore;
pub use event_store::PostgresEventStore;
pub use global_user_store::PostgresGlobalUserStore;
pub use user_store::PostgresUserStore;
pub use variant_store::PostgresVariantStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::domain::foundation::DomainError;

/// Retry attempts for transient storage faults.
const RETRY_ATTEMPTS: u32 = 3;

/// Base backoff delay; doubles per attempt.
const RETRY_BASE_DELAY_MS: u64 = 50;

/// Connects a pool and ensures the schema exists.
pub async fn connect(config: &StorageConfig) -> Result<PgPool, DomainError> {
    let uri = config
        .uri
        .as_deref()
        .ok_or_else(|| DomainError::storage_unavailable("no storage uri configured"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(uri)
        .await
        .map_err(|e| DomainError::storage_unavailable(format!("connect failed: {e}")))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Creates tables and indexes when absent.
async fn ensure_schema(pool: &PgPool) -> Result<(), DomainError> {
    const SCHEMA: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            business_id         TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            domain              TEXT NOT NULL,
            allowed_domains     TEXT[] NOT NULL DEFAULT '{}',
            api_key             TEXT NOT NULL,
            tier                TEXT NOT NULL,
            partner_ids         TEXT[] NOT NULL DEFAULT '{}',
            monthly_event_limit BIGINT,
            monthly_events_used BIGINT NOT NULL DEFAULT 0,
            is_active           BOOLEAN NOT NULL DEFAULT TRUE,
            created_at          TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE UNIQUE INDEX IF NOT EXISTS businesses_api_key_idx ON businesses (api_key)",
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id           BIGSERIAL PRIMARY KEY,
            business_id  TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            session_id   TEXT NOT NULL,
            global_uid   TEXT,
            event_name   TEXT NOT NULL,
            component_id TEXT,
            properties   JSONB NOT NULL DEFAULT '{}',
            occurred_at  TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS events_user_time_idx \
         ON events (business_id, user_id, occurred_at DESC)",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            business_id  TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            last_session JSONB,
            last_html    TEXT,
            updated_at   TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (business_id, user_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS variants (
            business_id           TEXT NOT NULL,
            user_id               TEXT NOT NULL,
            component_id          TEXT NOT NULL,
            a_html                TEXT NOT NULL,
            a_score               DOUBLE PRECISION NOT NULL DEFAULT 0,
            a_trials              BIGINT NOT NULL DEFAULT 0,
            a_history             JSONB NOT NULL DEFAULT '[]',
            b_html                TEXT NOT NULL,
            b_score               DOUBLE PRECISION NOT NULL DEFAULT 0,
            b_trials              BIGINT NOT NULL DEFAULT 0,
            b_history             JSONB NOT NULL DEFAULT '[]',
            regen_lock_expires_at TIMESTAMPTZ,
            PRIMARY KEY (business_id, user_id, component_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS global_users (
            global_uid    TEXT PRIMARY KEY,
            business_uids JSONB NOT NULL DEFAULT '{}',
            first_seen    TIMESTAMPTZ NOT NULL,
            last_seen     TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS data_sharing_agreements (
            agreement_id     TEXT PRIMARY KEY,
            from_business_id TEXT NOT NULL,
            to_business_id   TEXT NOT NULL,
            sharing_level    TEXT NOT NULL,
            permissions      JSONB NOT NULL DEFAULT '{}',
            status           TEXT NOT NULL,
            initiated_at     TIMESTAMPTZ NOT NULL
        )
        "#,
    ];

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DomainError::storage_unavailable(format!("schema setup failed: {e}")))?;
    }
    Ok(())
}

/// Runs `op`, retrying transient faults with exponential backoff.
pub(crate) async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=RETRY_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < RETRY_ATTEMPTS => {
                tracing::warn!(
                    operation = op_name,
                    attempt,
                    error = %e,
                    "transient storage error, backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) if is_transient(&e) => {
                return Err(DomainError::storage_unavailable(format!(
                    "{op_name} failed after {RETRY_ATTEMPTS} attempts: {e}"
                )));
            }
            Err(e) => {
                return Err(DomainError::storage_unavailable(format!(
                    "{op_name} failed: {e}"
                )));
            }
        }
    }
    unreachable!("retry loop always returns")
}

/// Transient faults worth retrying; constraint violations and friends
/// are not.
fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
    )
}
