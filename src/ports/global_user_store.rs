//! Cross-site identity store port.

use async_trait::async_trait;

use crate::domain::foundation::{BusinessId, DomainError, GlobalUid, UserId};
use crate::domain::tenant::GlobalUser;

/// Port for global user identities.
#[async_trait]
pub trait GlobalUserStore: Send + Sync {
    /// Looks up a global identity.
    async fn find(&self, global_uid: &GlobalUid) -> Result<Option<GlobalUser>, DomainError>;

    /// Links a tenant's local uid to a global identity, creating the
    /// record on first contact. Membership is append-only.
    async fn link(
        &self,
        global_uid: &GlobalUid,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<GlobalUser, DomainError>;
}
