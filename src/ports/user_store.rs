//! Tenant-scoped user store port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::behavior::{BehavioralVector, IdentityState};
use crate::domain::foundation::{BusinessId, DomainError, SessionId, Timestamp, UserId};

/// Snapshot of the most recent session-level inference for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub identity_state: IdentityState,
    pub identity_confidence: f64,
    pub behavioral_vector: BehavioralVector,
    pub observed_at: Timestamp,
}

/// Tenant-scoped user record: identity snapshot plus the most recently
/// rendered markup for preview surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub business_id: BusinessId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session: Option<SessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_html: Option<String>,
    pub updated_at: Timestamp,
}

/// Port for tenant-scoped user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up one user.
    async fn find(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, DomainError>;

    /// Upserts the latest session snapshot and rendered markup.
    async fn upsert_snapshot(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        snapshot: SessionSnapshot,
        last_html: Option<String>,
    ) -> Result<(), DomainError>;

    /// Tenant roster for the admin surface.
    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<UserProfile>, DomainError>;

    /// Total users known for a tenant.
    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError>;
}
