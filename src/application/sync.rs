//! Cross-site identity linking.

use crate::domain::foundation::{DomainError, GlobalUid, UserId};
use crate::domain::tenant::{Business, GlobalUser};
use crate::ports::GlobalUserStore;

use super::services::Services;

/// Links a tenant's local uid to a global identity. This is the only
/// path that mints a `global_uid`: the client's sync flow calls it when
/// no global identity exists yet.
pub async fn link_global_user(
    services: &Services,
    business: &Business,
    local_uid: String,
    global_uid: Option<String>,
) -> Result<GlobalUser, DomainError> {
    if local_uid.is_empty() {
        return Err(DomainError::validation("local_uid", "local_uid is required"));
    }
    let user_id = UserId::new(local_uid)?;
    let global_uid = match global_uid.filter(|g| !g.is_empty()) {
        Some(existing) => GlobalUid::new(existing)?,
        None => GlobalUid::mint(),
    };

    services
        .global_users
        .link(&global_uid, &business.business_id, &user_id)
        .await
}
