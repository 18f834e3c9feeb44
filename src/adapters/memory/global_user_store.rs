//! In-memory global user store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BusinessId, DomainError, GlobalUid, Timestamp, UserId};
use crate::domain::tenant::GlobalUser;
use crate::ports::GlobalUserStore;

/// In-memory cross-site identity records.
#[derive(Debug, Default)]
pub struct InMemoryGlobalUserStore {
    users: RwLock<HashMap<GlobalUid, GlobalUser>>,
}

impl InMemoryGlobalUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GlobalUserStore for InMemoryGlobalUserStore {
    async fn find(&self, global_uid: &GlobalUid) -> Result<Option<GlobalUser>, DomainError> {
        Ok(self.users.read().await.get(global_uid).cloned())
    }

    async fn link(
        &self,
        global_uid: &GlobalUid,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<GlobalUser, DomainError> {
        let mut users = self.users.write().await;
        let now = Timestamp::now();

        let user = users
            .entry(global_uid.clone())
            .and_modify(|u| u.link(business_id.clone(), user_id.clone(), now))
            .or_insert_with(|| {
                GlobalUser::first_link(
                    global_uid.clone(),
                    business_id.clone(),
                    user_id.clone(),
                    now,
                )
            });
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_creates_then_appends() {
        let store = InMemoryGlobalUserStore::new();
        let guid = GlobalUid::new("guid_1").unwrap();

        store
            .link(
                &guid,
                &BusinessId::new("biz_shoes").unwrap(),
                &UserId::new("user_1").unwrap(),
            )
            .await
            .unwrap();
        let linked = store
            .link(
                &guid,
                &BusinessId::new("biz_clothes").unwrap(),
                &UserId::new("user_2").unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(linked.business_uids.len(), 2);
        assert!(store.find(&guid).await.unwrap().is_some());
    }
}
