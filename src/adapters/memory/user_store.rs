//! In-memory user store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BusinessId, DomainError, Timestamp, UserId};
use crate::ports::{SessionSnapshot, UserProfile, UserStore};

/// In-memory tenant-scoped user records.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<(BusinessId, UserId), UserProfile>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, DomainError> {
        let users = self.users.read().await;
        Ok(users
            .get(&(business_id.clone(), user_id.clone()))
            .cloned())
    }

    async fn upsert_snapshot(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        snapshot: SessionSnapshot,
        last_html: Option<String>,
    ) -> Result<(), DomainError> {
        let mut users = self.users.write().await;
        let entry = users
            .entry((business_id.clone(), user_id.clone()))
            .or_insert_with(|| UserProfile {
                business_id: business_id.clone(),
                user_id: user_id.clone(),
                last_session: None,
                last_html: None,
                updated_at: Timestamp::now(),
            });

        entry.last_session = Some(snapshot);
        if last_html.is_some() {
            entry.last_html = last_html;
        }
        entry.updated_at = Timestamp::now();
        Ok(())
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<UserProfile>, DomainError> {
        let users = self.users.read().await;
        let mut matched: Vec<UserProfile> = users
            .values()
            .filter(|u| &u.business_id == business_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(matched)
    }

    async fn count_for_business(&self, business_id: &BusinessId) -> Result<u64, DomainError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| &u.business_id == business_id)
            .count() as u64)
    }
}
