//! Shared service wiring.
//!
//! All collaborators are explicit dependencies constructed at startup and
//! shared by reference; there are no process-wide singletons.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, BanditConfig};
use crate::domain::behavior::AggregationWindow;
use crate::domain::tenant::BusinessTier;
use crate::domain::variants::{GuardrailPolicy, SelectionPolicy};
use crate::ports::{
    AgreementStore, AiProvider, BusinessStore, EventStore, GlobalUserStore, RateLimiter,
    UserStore, VariantStore,
};

use super::event_ingestor::EventIngestor;
use super::regeneration::RegenerationEngine;

/// Whether the LLM loop is live or stubbed, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineMode {
    /// Full pipeline with a live LLM provider.
    MultiAgent,
    /// No provider key: deterministic pipeline, mock regeneration.
    Stub,
}

impl EngineMode {
    /// Wire form of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::MultiAgent => "multi-agent",
            EngineMode::Stub => "stub",
        }
    }
}

/// The dependency bundle handed to every pipeline.
#[derive(Clone)]
pub struct Services {
    pub businesses: Arc<dyn BusinessStore>,
    pub events: Arc<dyn EventStore>,
    pub users: Arc<dyn UserStore>,
    pub variants: Arc<dyn VariantStore>,
    pub global_users: Arc<dyn GlobalUserStore>,
    pub agreements: Arc<dyn AgreementStore>,
    pub ingestor: Arc<EventIngestor>,
    pub regeneration: Arc<RegenerationEngine>,
    pub bandit: Arc<BanditConfig>,
    pub guardrail: GuardrailPolicy,
    pub window: AggregationWindow,
    pub request_deadline: Duration,
    pub mode: EngineMode,
}

impl Services {
    /// The selection policy applied to one tenant: the tier's exploration
    /// rate unless a process-wide ε override is configured.
    pub fn selection_for(&self, tier: BusinessTier) -> SelectionPolicy {
        self.bandit.selection_policy(tier.limits().exploration_rate)
    }
}

/// Everything `Services::build` needs besides configuration.
pub struct Stores {
    pub businesses: Arc<dyn BusinessStore>,
    pub events: Arc<dyn EventStore>,
    pub users: Arc<dyn UserStore>,
    pub variants: Arc<dyn VariantStore>,
    pub global_users: Arc<dyn GlobalUserStore>,
    pub agreements: Arc<dyn AgreementStore>,
}

impl Services {
    /// Wires the pipelines from configuration, stores, and the provider
    /// selected by the startup capability check.
    pub fn build(
        config: &AppConfig,
        stores: Stores,
        ai: Arc<dyn AiProvider>,
        hf_limiter: Arc<dyn RateLimiter>,
        mode: EngineMode,
    ) -> Self {
        let ingestor = Arc::new(EventIngestor::spawn(
            stores.events.clone(),
            stores.businesses.clone(),
            &config.limits,
            hf_limiter,
        ));

        let regeneration = Arc::new(RegenerationEngine::new(
            stores.variants.clone(),
            ai,
            config.guardrail.policy(),
            Duration::from_secs(config.ai.regeneration_deadline_secs),
        ));

        Self {
            businesses: stores.businesses,
            events: stores.events,
            users: stores.users,
            variants: stores.variants,
            global_users: stores.global_users,
            agreements: stores.agreements,
            ingestor,
            regeneration,
            bandit: Arc::new(config.bandit.clone()),
            guardrail: config.guardrail.policy(),
            window: AggregationWindow::default(),
            request_deadline: Duration::from_millis(config.bandit.request_deadline_ms),
            mode,
        }
    }
}
