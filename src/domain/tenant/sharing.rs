//! Data-sharing agreements between tenants.
//!
//! Agreements are advisory metadata owned by the persistence layer. The
//! service never routes behavioral data across tenant boundaries on their
//! basis, and partner provisioning happens outside this service, so no
//! management surface exists for them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::foundation::{BusinessId, Timestamp};

/// What a partner is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingLevel {
    /// Only aggregated behavioral profiles.
    Aggregate,
    /// Full user journey across partner sites.
    Full,
}

/// Lifecycle of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Pending,
    Active,
    Revoked,
}

/// A directed sharing agreement from one tenant to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSharingAgreement {
    pub agreement_id: String,
    pub from_business_id: BusinessId,
    pub to_business_id: BusinessId,
    pub sharing_level: SharingLevel,
    pub permissions: BTreeMap<String, bool>,
    pub status: AgreementStatus,
    pub initiated_at: Timestamp,
}

impl DataSharingAgreement {
    /// Opens a pending agreement with the default permission set.
    pub fn open(
        from_business_id: BusinessId,
        to_business_id: BusinessId,
        sharing_level: SharingLevel,
    ) -> Self {
        let mut permissions = BTreeMap::new();
        permissions.insert("share_behavioral_vectors".to_string(), true);
        permissions.insert("share_identity_states".to_string(), true);
        permissions.insert("share_conversion_data".to_string(), false);
        permissions.insert("share_raw_events".to_string(), false);

        Self {
            agreement_id: format!("agr_{}", &Uuid::new_v4().simple().to_string()[..12]),
            from_business_id,
            to_business_id,
            sharing_level,
            permissions,
            status: AgreementStatus::Pending,
            initiated_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agreements_start_pending_with_conservative_permissions() {
        let agreement = DataSharingAgreement::open(
            BusinessId::new("biz_shoes").unwrap(),
            BusinessId::new("biz_clothes").unwrap(),
            SharingLevel::Aggregate,
        );

        assert!(agreement.agreement_id.starts_with("agr_"));
        assert_eq!(agreement.status, AgreementStatus::Pending);
        assert_eq!(agreement.permissions["share_behavioral_vectors"], true);
        assert_eq!(agreement.permissions["share_raw_events"], false);
    }

    #[test]
    fn sharing_level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SharingLevel::Aggregate).unwrap(),
            "\"aggregate\""
        );
        assert_eq!(
            serde_json::to_string(&AgreementStatus::Revoked).unwrap(),
            "\"revoked\""
        );
    }
}
