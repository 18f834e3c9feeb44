//! Cross-site user identity linking local tenant uids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{BusinessId, GlobalUid, Timestamp, UserId};

/// A global identity record. Membership only ever grows: linking a new
/// (tenant, local uid) pair appends; nothing is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalUser {
    pub global_uid: GlobalUid,
    pub business_uids: BTreeMap<BusinessId, UserId>,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
}

impl GlobalUser {
    /// Creates a record from the first observed link.
    pub fn first_link(
        global_uid: GlobalUid,
        business_id: BusinessId,
        user_id: UserId,
        at: Timestamp,
    ) -> Self {
        let mut business_uids = BTreeMap::new();
        business_uids.insert(business_id, user_id);
        Self {
            global_uid,
            business_uids,
            first_seen: at,
            last_seen: at,
        }
    }

    /// Links (or re-links) a tenant's local uid and refreshes `last_seen`.
    pub fn link(&mut self, business_id: BusinessId, user_id: UserId, at: Timestamp) {
        self.business_uids.insert(business_id, user_id);
        self.last_seen = at;
    }

    /// The local uid this identity carries for a tenant, if linked.
    pub fn local_uid(&self, business_id: &BusinessId) -> Option<&UserId> {
        self.business_uids.get(business_id)
    }
}
