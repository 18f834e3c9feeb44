//! Multi-tenant domain: businesses, tiers, cross-site identities, and
//! data-sharing agreements.

mod business;
mod global_user;
mod sharing;

pub use business::{Business, BusinessTier, TierLimits};
pub use global_user::GlobalUser;
pub use sharing::{AgreementStatus, DataSharingAgreement, SharingLevel};
