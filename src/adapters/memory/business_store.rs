//! In-memory business store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BusinessId, DomainError, ErrorCode};
use crate::domain::tenant::Business;
use crate::ports::{BusinessStore, QuotaOutcome};

/// In-memory tenant registry keyed by business id, with an api-key index.
#[derive(Debug, Default)]
pub struct InMemoryBusinessStore {
    businesses: RwLock<HashMap<BusinessId, Business>>,
}

impl InMemoryBusinessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a business directly (test and dev bootstrap).
    pub async fn seed(&self, business: Business) {
        self.businesses
            .write()
            .await
            .insert(business.business_id.clone(), business);
    }
}

#[async_trait]
impl BusinessStore for InMemoryBusinessStore {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Business>, DomainError> {
        let businesses = self.businesses.read().await;
        Ok(businesses
            .values()
            .find(|b| b.api_key == api_key && b.is_active)
            .cloned())
    }

    async fn find_by_id(
        &self,
        business_id: &BusinessId,
    ) -> Result<Option<Business>, DomainError> {
        Ok(self.businesses.read().await.get(business_id).cloned())
    }

    async fn insert(&self, business: &Business) -> Result<(), DomainError> {
        let mut businesses = self.businesses.write().await;
        if businesses.values().any(|b| b.api_key == business.api_key) {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "api_key already registered",
            ));
        }
        businesses.insert(business.business_id.clone(), business.clone());
        Ok(())
    }

    async fn consume_quota(
        &self,
        business_id: &BusinessId,
        count: u64,
    ) -> Result<QuotaOutcome, DomainError> {
        let mut businesses = self.businesses.write().await;
        let business = businesses.get_mut(business_id).ok_or_else(|| {
            DomainError::new(ErrorCode::BusinessNotFound, "unknown business")
        })?;

        let granted = match business.remaining_quota() {
            Some(remaining) => remaining.min(count),
            None => count,
        };
        business.monthly_events_used += granted;
        Ok(QuotaOutcome { granted })
    }
}
