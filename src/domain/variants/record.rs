//! Per-(user, component) variant records.
//!
//! A record holds exactly two competing slots, A and B. Both are seeded from
//! the site author's original fragment; regeneration later replaces the
//! losing slot's markup while archiving what it retires. `current_score` is
//! the running mean of rewards; `number_of_trials` counts optimize responses
//! that actually served the slot.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{BusinessId, ComponentId, Timestamp, UserId};

/// One of the two competing slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotLabel {
    A,
    B,
}

impl SlotLabel {
    /// The opposing slot.
    pub fn other(&self) -> Self {
        match self {
            SlotLabel::A => SlotLabel::B,
            SlotLabel::B => SlotLabel::A,
        }
    }

    /// Parses the wire form ("A" or "B", case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(SlotLabel::A),
            "B" => Some(SlotLabel::B),
            _ => None,
        }
    }

    /// Wire form of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotLabel::A => "A",
            SlotLabel::B => "B",
        }
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A retired markup candidate with the score it held at retirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedVariant {
    pub html: String,
    pub score: f64,
    pub retired_at: Timestamp,
}

/// One competing variant: live markup, rolling score, trial count, and the
/// full archive of everything it previously held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSlot {
    pub current_html: String,
    pub current_score: f64,
    pub number_of_trials: u64,
    #[serde(default)]
    pub history: Vec<ArchivedVariant>,
}

impl VariantSlot {
    /// Seeds a fresh slot from the author's original fragment.
    pub fn seeded(html: impl Into<String>) -> Self {
        Self {
            current_html: html.into(),
            current_score: 0.0,
            number_of_trials: 0,
            history: Vec::new(),
        }
    }

    /// Counts one served trial.
    pub fn record_trial(&mut self) {
        self.number_of_trials += 1;
    }

    /// Folds a reward into the rolling mean.
    ///
    /// `μ ← μ + (r − μ) / n` with `n` the served-trial count; a reward that
    /// races ahead of its trial divides by 1.
    pub fn apply_reward(&mut self, reward: f64) {
        let n = self.number_of_trials.max(1) as f64;
        self.current_score += (reward - self.current_score) / n;
    }

    /// Archives the live markup and installs a regenerated candidate,
    /// resetting score and trials for the newcomer.
    pub fn install_candidate(&mut self, new_html: impl Into<String>, retired_at: Timestamp) {
        self.history.push(ArchivedVariant {
            html: std::mem::take(&mut self.current_html),
            score: self.current_score,
            retired_at,
        });
        self.current_html = new_html.into();
        self.current_score = 0.0;
        self.number_of_trials = 0;
    }

    /// The CAS tuple guarding concurrent mutations of this slot.
    pub fn version(&self) -> (f64, u64) {
        (self.current_score, self.number_of_trials)
    }
}

/// Key of a variant record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub component_id: ComponentId,
}

impl VariantKey {
    pub fn new(business_id: BusinessId, user_id: UserId, component_id: ComponentId) -> Self {
        Self {
            business_id,
            user_id,
            component_id,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.business_id, self.user_id, self.component_id
        )
    }
}

/// The A/B record for one (business, user, component).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    #[serde(rename = "A")]
    pub slot_a: VariantSlot,
    #[serde(rename = "B")]
    pub slot_b: VariantSlot,
}

impl VariantRecord {
    /// Materializes a record with both slots holding the author's fragment.
    pub fn seeded(seed_html: &str) -> Self {
        Self {
            slot_a: VariantSlot::seeded(seed_html),
            slot_b: VariantSlot::seeded(seed_html),
        }
    }

    /// Borrows a slot by label.
    pub fn slot(&self, label: SlotLabel) -> &VariantSlot {
        match label {
            SlotLabel::A => &self.slot_a,
            SlotLabel::B => &self.slot_b,
        }
    }

    /// Mutably borrows a slot by label.
    pub fn slot_mut(&mut self, label: SlotLabel) -> &mut VariantSlot {
        match label {
            SlotLabel::A => &mut self.slot_a,
            SlotLabel::B => &mut self.slot_b,
        }
    }

    /// The slot currently leading on score; ties go to A.
    pub fn leader(&self) -> SlotLabel {
        if self.slot_b.current_score > self.slot_a.current_score {
            SlotLabel::B
        } else {
            SlotLabel::A
        }
    }

    /// Absolute score gap between the slots.
    pub fn score_gap(&self) -> f64 {
        (self.slot_a.current_score - self.slot_b.current_score).abs()
    }

    /// Total served trials across both slots.
    pub fn total_trials(&self) -> u64 {
        self.slot_a.number_of_trials + self.slot_b.number_of_trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_record_starts_both_slots_identical() {
        let record = VariantRecord::seeded("<h1>Welcome</h1>");

        for label in [SlotLabel::A, SlotLabel::B] {
            let slot = record.slot(label);
            assert_eq!(slot.current_html, "<h1>Welcome</h1>");
            assert_eq!(slot.current_score, 0.0);
            assert_eq!(slot.number_of_trials, 0);
            assert!(slot.history.is_empty());
        }
    }

    #[test]
    fn reward_after_first_trial_sets_score_to_reward() {
        let mut record = VariantRecord::seeded("<h1>Welcome</h1>");
        record.slot_mut(SlotLabel::A).record_trial();
        record.slot_mut(SlotLabel::A).apply_reward(1.0);

        assert_eq!(record.slot_a.current_score, 1.0);
        assert_eq!(record.slot_a.number_of_trials, 1);
        assert_eq!(record.slot_b.current_score, 0.0);
    }

    #[test]
    fn rolling_score_is_an_incremental_mean() {
        let mut slot = VariantSlot::seeded("<div/>");
        let rewards = [3.0, 1.0, 2.0, 4.0];

        for (i, reward) in rewards.iter().enumerate() {
            slot.record_trial();
            slot.apply_reward(*reward);
            let mean: f64 = rewards[..=i].iter().sum::<f64>() / (i + 1) as f64;
            assert!((slot.current_score - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn reward_order_does_not_change_the_mean() {
        let mut forward = VariantSlot::seeded("<div/>");
        let mut backward = VariantSlot::seeded("<div/>");
        let rewards = [0.5, 2.0, 1.5, 3.0, 1.0];

        for r in rewards {
            forward.record_trial();
            forward.apply_reward(r);
        }
        for r in rewards.iter().rev() {
            backward.record_trial();
            backward.apply_reward(*r);
        }

        assert!((forward.current_score - backward.current_score).abs() < 1e-9);
    }

    #[test]
    fn reward_without_trial_divides_by_one() {
        let mut slot = VariantSlot::seeded("<div/>");
        slot.apply_reward(2.5);
        assert_eq!(slot.current_score, 2.5);
        assert_eq!(slot.number_of_trials, 0);
    }

    #[test]
    fn install_candidate_archives_and_resets() {
        let mut slot = VariantSlot::seeded("<h1>Old</h1>");
        slot.record_trial();
        slot.apply_reward(1.5);

        let retired_at = Timestamp::from_unix_secs(2_000);
        slot.install_candidate("<h1>New</h1>", retired_at);

        assert_eq!(slot.current_html, "<h1>New</h1>");
        assert_eq!(slot.current_score, 0.0);
        assert_eq!(slot.number_of_trials, 0);
        assert_eq!(slot.history.len(), 1);
        assert_eq!(slot.history[0].html, "<h1>Old</h1>");
        assert_eq!(slot.history[0].score, 1.5);
        assert_eq!(slot.history[0].retired_at, retired_at);
    }

    #[test]
    fn history_grows_with_each_regeneration() {
        let mut slot = VariantSlot::seeded("v0");
        slot.install_candidate("v1", Timestamp::from_unix_secs(1));
        slot.install_candidate("v2", Timestamp::from_unix_secs(2));

        assert_eq!(slot.history.len(), 2);
        assert_eq!(slot.history[0].html, "v0");
        assert_eq!(slot.history[1].html, "v1");
        assert_eq!(slot.current_html, "v2");
    }

    #[test]
    fn leader_prefers_a_on_ties() {
        let record = VariantRecord::seeded("<div/>");
        assert_eq!(record.leader(), SlotLabel::A);

        let mut record = VariantRecord::seeded("<div/>");
        record.slot_mut(SlotLabel::B).record_trial();
        record.slot_mut(SlotLabel::B).apply_reward(2.0);
        assert_eq!(record.leader(), SlotLabel::B);
    }

    #[test]
    fn slot_label_round_trips_wire_form() {
        assert_eq!(SlotLabel::parse("A"), Some(SlotLabel::A));
        assert_eq!(SlotLabel::parse("b"), Some(SlotLabel::B));
        assert_eq!(SlotLabel::parse("C"), None);
        assert_eq!(SlotLabel::A.other(), SlotLabel::B);
    }

    #[test]
    fn record_serializes_with_slot_letter_keys() {
        let record = VariantRecord::seeded("<div/>");
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("A").is_some());
        assert!(json.get("B").is_some());
        assert_eq!(json["A"]["number_of_trials"], 0);
        assert_eq!(json["A"]["current_html"], "<div/>");
    }
}
