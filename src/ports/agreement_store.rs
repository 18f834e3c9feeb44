//! Data-sharing agreement store port.
//!
//! The persistence layer owns the `data_sharing_agreements` collection;
//! agreements are advisory metadata consulted read-only. Partner
//! provisioning itself happens outside this service's boundary, so there
//! is no lifecycle surface here.

use async_trait::async_trait;

use crate::domain::foundation::{BusinessId, DomainError};
use crate::domain::tenant::{AgreementStatus, DataSharingAgreement};

/// Port for data-sharing agreements.
#[async_trait]
pub trait AgreementStore: Send + Sync {
    /// Records an agreement.
    async fn insert(&self, agreement: &DataSharingAgreement) -> Result<(), DomainError>;

    /// Agreements involving a tenant (either direction), optionally
    /// filtered by status.
    async fn list_for_business(
        &self,
        business_id: &BusinessId,
        status: Option<AgreementStatus>,
    ) -> Result<Vec<DataSharingAgreement>, DomainError>;
}
