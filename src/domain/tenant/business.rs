//! Business (tenant) model and subscription tiers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::foundation::{BusinessId, Timestamp};

/// Subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessTier {
    Free,
    Starter,
    Growth,
    Enterprise,
}

/// Limits attached to a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierLimits {
    /// Monthly event quota; `None` means unlimited.
    pub monthly_events: Option<u64>,
    /// Partner cap for data-sharing agreements; `None` means unlimited.
    pub max_partners: Option<u32>,
    /// Whether cross-site tracking is available.
    pub cross_site_tracking: bool,
    /// Exploration rate applied by the selection bandit.
    pub exploration_rate: f64,
}

impl BusinessTier {
    /// Limits for this tier.
    pub fn limits(&self) -> TierLimits {
        match self {
            BusinessTier::Free => TierLimits {
                monthly_events: Some(10_000),
                max_partners: Some(0),
                cross_site_tracking: false,
                exploration_rate: 0.2,
            },
            BusinessTier::Starter => TierLimits {
                monthly_events: Some(100_000),
                max_partners: Some(3),
                cross_site_tracking: true,
                exploration_rate: 0.2,
            },
            BusinessTier::Growth => TierLimits {
                monthly_events: Some(1_000_000),
                max_partners: Some(10),
                cross_site_tracking: true,
                exploration_rate: 0.15,
            },
            BusinessTier::Enterprise => TierLimits {
                monthly_events: None,
                max_partners: None,
                cross_site_tracking: true,
                exploration_rate: 0.1,
            },
        }
    }
}

/// A registered tenant. Effectively immutable after registration, apart
/// from the usage counter and partner list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub business_id: BusinessId,
    pub name: String,
    pub domain: String,
    pub allowed_domains: BTreeSet<String>,
    pub api_key: String,
    pub tier: BusinessTier,
    pub partner_ids: BTreeSet<BusinessId>,
    pub monthly_event_limit: Option<u64>,
    pub monthly_events_used: u64,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl Business {
    /// Registers a business: mints an id and API key, and admits the
    /// primary domain alongside any extra allowed domains.
    pub fn register(
        name: impl Into<String>,
        domain: impl Into<String>,
        extra_domains: impl IntoIterator<Item = String>,
        tier: BusinessTier,
    ) -> Self {
        let domain = domain.into();
        let mut allowed_domains: BTreeSet<String> = extra_domains.into_iter().collect();
        allowed_domains.insert(domain.clone());

        Self {
            business_id: BusinessId::mint(),
            name: name.into(),
            domain,
            allowed_domains,
            api_key: mint_api_key(),
            tier,
            partner_ids: BTreeSet::new(),
            monthly_event_limit: tier.limits().monthly_events,
            monthly_events_used: 0,
            is_active: true,
            created_at: Timestamp::now(),
        }
    }

    /// Whether a request origin is admitted. An empty allow-list admits
    /// any origin (single-domain dev setups register without one).
    pub fn admits_origin(&self, origin: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let host = origin
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split(['/', ':'])
            .next()
            .unwrap_or(origin);
        self.allowed_domains.iter().any(|d| d == host)
    }

    /// Remaining monthly quota, `None` when unlimited.
    pub fn remaining_quota(&self) -> Option<u64> {
        self.monthly_event_limit
            .map(|limit| limit.saturating_sub(self.monthly_events_used))
    }

    /// True when no further events may be accepted this month.
    pub fn quota_exhausted(&self) -> bool {
        matches!(self.remaining_quota(), Some(0))
    }
}

fn mint_api_key() -> String {
    format!(
        "pk_live_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
