//! Selection, reward, and guardrail configuration.

use serde::Deserialize;
use std::collections::HashMap;

use super::error::ValidationError;
use crate::domain::variants::{GuardrailPolicy, SelectionPolicy};

/// Bandit and orchestration tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct BanditConfig {
    /// Process-wide exploration rate override. When unset, each tenant
    /// uses its tier's exploration rate.
    #[serde(default)]
    pub epsilon: Option<f64>,
    /// Trials required on both slots before regeneration may trigger.
    #[serde(default = "default_min_trials")]
    pub min_trials: u64,
    /// Score gap that schedules regeneration of the losing slot.
    #[serde(default = "default_regen_gap")]
    pub regen_gap: f64,
    /// Soft deadline for an optimize request, in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    /// Reward scalar per reward type; unknown types fall back to
    /// `default_reward`.
    #[serde(default = "default_reward_weights")]
    pub reward_weights: HashMap<String, f64>,
    /// Reward applied when the type carries no configured weight.
    #[serde(default = "default_reward")]
    pub default_reward: f64,
}

/// Guardrail tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    /// Size bound for candidate markup, in KiB.
    #[serde(default = "default_max_kib")]
    pub max_kib: usize,
    /// Content-policy phrases that disqualify a candidate.
    #[serde(default)]
    pub flagged_phrases: Vec<String>,
}

fn default_min_trials() -> u64 {
    5
}

fn default_regen_gap() -> f64 {
    1.0
}

fn default_request_deadline_ms() -> u64 {
    500
}

fn default_reward() -> f64 {
    1.0
}

fn default_reward_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("click".to_string(), 1.0),
        ("cta_click".to_string(), 3.0),
        ("form_submit".to_string(), 4.0),
        ("add_to_cart".to_string(), 5.0),
        ("signup".to_string(), 6.0),
        ("purchase".to_string(), 10.0),
    ])
}

fn default_max_kib() -> usize {
    64
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            epsilon: None,
            min_trials: default_min_trials(),
            regen_gap: default_regen_gap(),
            request_deadline_ms: default_request_deadline_ms(),
            reward_weights: default_reward_weights(),
            default_reward: default_reward(),
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_kib: default_max_kib(),
            flagged_phrases: Vec::new(),
        }
    }
}

impl BanditConfig {
    /// Reward value for a reward type.
    pub fn reward_for(&self, reward_type: &str) -> f64 {
        self.reward_weights
            .get(reward_type)
            .copied()
            .unwrap_or(self.default_reward)
            .max(0.0)
    }

    /// Builds the domain selection policy. `tier_epsilon` applies unless
    /// a process-wide override is configured.
    pub fn selection_policy(&self, tier_epsilon: f64) -> SelectionPolicy {
        SelectionPolicy::new(
            self.epsilon.unwrap_or(tier_epsilon),
            self.min_trials,
            self.regen_gap,
        )
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(epsilon) = self.epsilon {
            if !(0.0..=1.0).contains(&epsilon) {
                return Err(ValidationError::invalid(
                    "bandit.epsilon",
                    "must be in [0, 1]",
                ));
            }
        }
        if self.regen_gap <= 0.0 {
            return Err(ValidationError::invalid(
                "bandit.regen_gap",
                "must be positive",
            ));
        }
        if self.request_deadline_ms == 0 {
            return Err(ValidationError::invalid(
                "bandit.request_deadline_ms",
                "must be at least 1",
            ));
        }
        if self.reward_weights.values().any(|w| *w < 0.0) {
            return Err(ValidationError::invalid(
                "bandit.reward_weights",
                "rewards are non-negative",
            ));
        }
        Ok(())
    }
}

impl GuardrailConfig {
    /// Builds the domain guardrail policy.
    pub fn policy(&self) -> GuardrailPolicy {
        GuardrailPolicy::new(self.max_kib * 1024, self.flagged_phrases.clone())
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_kib == 0 {
            return Err(ValidationError::invalid(
                "guardrail.max_kib",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
