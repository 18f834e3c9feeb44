//! In-memory variant store with CAS and advisory-lock semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BusinessId, DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::variants::{ArchivedVariant, SlotLabel, VariantKey, VariantRecord};
use crate::ports::{CasOutcome, VariantStore};

/// In-memory variant records plus regeneration lock expiries.
#[derive(Debug, Default)]
pub struct InMemoryVariantStore {
    records: RwLock<HashMap<VariantKey, VariantRecord>>,
    locks: RwLock<HashMap<VariantKey, Timestamp>>,
}

impl InMemoryVariantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn scores_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[async_trait]
impl VariantStore for InMemoryVariantStore {
    async fn get_or_init(
        &self,
        key: &VariantKey,
        seed_html: &str,
    ) -> Result<VariantRecord, DomainError> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(key.clone())
            .or_insert_with(|| VariantRecord::seeded(seed_html))
            .clone())
    }

    async fn get(&self, key: &VariantKey) -> Result<Option<VariantRecord>, DomainError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn update_slot(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        expected: (f64, u64),
        new_score: f64,
        new_trials: u64,
    ) -> Result<CasOutcome, DomainError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| DomainError::new(ErrorCode::VariantNotFound, format!("{key}")))?;

        let live = record.slot(slot);
        if !scores_equal(live.current_score, expected.0) || live.number_of_trials != expected.1 {
            return Ok(CasOutcome::Conflict {
                current: record.clone(),
            });
        }

        let target = record.slot_mut(slot);
        target.current_score = new_score;
        target.number_of_trials = new_trials;
        Ok(CasOutcome::Committed)
    }

    async fn replace_html(
        &self,
        key: &VariantKey,
        slot: SlotLabel,
        new_html: &str,
        archive: ArchivedVariant,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| DomainError::new(ErrorCode::VariantNotFound, format!("{key}")))?;

        let target = record.slot_mut(slot);
        target.history.push(archive);
        target.current_html = new_html.to_string();
        target.current_score = 0.0;
        target.number_of_trials = 0;
        Ok(())
    }

    async fn try_acquire_regeneration_lock(
        &self,
        key: &VariantKey,
        ttl_secs: i64,
    ) -> Result<bool, DomainError> {
        let mut locks = self.locks.write().await;
        let now = Timestamp::now();

        if let Some(expires) = locks.get(key) {
            if expires.is_after(&now) {
                return Ok(false);
            }
        }
        locks.insert(key.clone(), now.plus_secs(ttl_secs));
        Ok(true)
    }

    async fn release_regeneration_lock(&self, key: &VariantKey) -> Result<(), DomainError> {
        self.locks.write().await.remove(key);
        Ok(())
    }

    async fn list_for_user(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError> {
        let records = self.records.read().await;
        let mut matched: Vec<(VariantKey, VariantRecord)> = records
            .iter()
            .filter(|(k, _)| &k.business_id == business_id && &k.user_id == user_id)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        matched.sort_by(|(a, _), (b, _)| a.component_id.cmp(&b.component_id));
        Ok(matched)
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<(VariantKey, VariantRecord)>, DomainError> {
        let records = self.records.read().await;
        let mut matched: Vec<(VariantKey, VariantRecord)> = records
            .iter()
            .filter(|(k, _)| &k.business_id == business_id)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        matched.sort_by(|(a, _), (b, _)| {
            (&a.user_id, &a.component_id).cmp(&(&b.user_id, &b.component_id))
        });
        Ok(matched)
    }
}
