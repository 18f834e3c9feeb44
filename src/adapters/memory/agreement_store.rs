//! In-memory data-sharing agreement store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BusinessId, DomainError};
use crate::domain::tenant::{AgreementStatus, DataSharingAgreement};
use crate::ports::AgreementStore;

/// In-memory agreements keyed by agreement id.
#[derive(Debug, Default)]
pub struct InMemoryAgreementStore {
    agreements: RwLock<HashMap<String, DataSharingAgreement>>,
}

impl InMemoryAgreementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgreementStore for InMemoryAgreementStore {
    async fn insert(&self, agreement: &DataSharingAgreement) -> Result<(), DomainError> {
        self.agreements
            .write()
            .await
            .insert(agreement.agreement_id.clone(), agreement.clone());
        Ok(())
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
        status: Option<AgreementStatus>,
    ) -> Result<Vec<DataSharingAgreement>, DomainError> {
        let agreements = self.agreements.read().await;
        Ok(agreements
            .values()
            .filter(|a| {
                (&a.from_business_id == business_id || &a.to_business_id == business_id)
                    && status.map(|s| a.status == s).unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::SharingLevel;

    #[tokio::test]
    async fn agreements_round_trip_with_status_filtering() {
        let store = InMemoryAgreementStore::new();
        let from = BusinessId::new("biz_shoes").unwrap();
        let to = BusinessId::new("biz_clothes").unwrap();

        let mut pending =
            DataSharingAgreement::open(from.clone(), to.clone(), SharingLevel::Aggregate);
        store.insert(&pending).await.unwrap();

        pending.status = AgreementStatus::Active;
        store.insert(&pending).await.unwrap();

        let active = store
            .list_for_business(&to, Some(AgreementStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let pending_left = store
            .list_for_business(&from, Some(AgreementStatus::Pending))
            .await
            .unwrap();
        assert!(pending_left.is_empty());

        let all = store.list_for_business(&from, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn uninvolved_tenants_see_nothing() {
        let store = InMemoryAgreementStore::new();
        let agreement = DataSharingAgreement::open(
            BusinessId::new("biz_shoes").unwrap(),
            BusinessId::new("biz_clothes").unwrap(),
            SharingLevel::Full,
        );
        store.insert(&agreement).await.unwrap();

        let other = store
            .list_for_business(&BusinessId::new("biz_other").unwrap(), None)
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
