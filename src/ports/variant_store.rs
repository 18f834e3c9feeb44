//! Variant record store port.
//!
//! Mutations race: concurrent optimize and reward requests touch the same
//! record, so score updates go through compare-and-set on the prior
//! `(current_score, number_of_trials)` tuple. Regeneration coordination
//! uses a storage-held advisory lock with a TTL so a crashed worker cannot
//! wedge a record.

use async_trait::async_trait;

use crate::domain::foundation::{BusinessId, DomainError, UserId};
use crate::domain::variants::{ArchivedVariant, SlotLabel, VariantKey, VariantRecord};

/// Outcome of a compare-and-set slot update.
#[derive(Debug, Clone)]
pub enum CasOutcome {
    /// The update landed.
    Committed,
    /// Another writer got there first; the authoritative record is
    /// returned so the caller can retry or surface it.
    Conflict { current: VariantRecord },
}

impl CasOutcome {
    /// True when the update landed.
    pub fn is_committed(&self) -> bool {
        matches!(self, CasOutcome::Committed)
    }
}

/// Port for variant records.
#[async_trait]
pub trait VariantStore: Send + Sync {
    /// Loads the record, materializing it seeded from `seed_html` when
    /// absent. Idempotent: repeated calls return identical records and
    /// never grow history.
    async fn get_or_init(
        &self,
        key: &VariantKey,
        seed_html: &str,
    ) -> Result<VariantRecord, DomainError>;

    /// Loads an existing record.
    async fn get(&self, key: &VariantKey) -> Result<Option<VariantRecord>, DomainError>;

    /// Conditionally updates one slot's score and trial count, guarded by
    /// the expected prior `(current_score, number_of_trials)`.
    async fn update_slot(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        expected: (f64, u64),
        new_score: f64,
        new_trials: u64,
    ) -> Result<CasOutcome, DomainError>;

    /// Replaces a slot's markup with a regenerated candidate: appends
    /// `archive` to history, installs `new_html`, and resets the slot's
    /// score and trial count.
    async fn replace_html(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        new_html: &str,
        archive: ArchivedVariant,
    ) -> Result<(), DomainError>;

    /// Attempts to take the advisory regeneration lock for a record.
    /// Returns false when another regeneration is in flight and its TTL
    /// has not lapsed.
    async fn try_acquire_regeneration_lock(
        &self,
        key: &VariantKey,
        ttl_secs: i64,
    ) -> Result<bool, DomainError>;

    /// Releases the advisory regeneration lock.
    async fn release_regeneration_lock(&self, key: &VariantKey) -> Result<(), DomainError>;

    /// All records for one user (journey surface).
    async fn list_for_user(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError>;

    /// All records for a tenant (dashboard surface).
    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError>;
}
