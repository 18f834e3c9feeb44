//! The reward pipeline: score updates and the regeneration trigger.
//!
//! The response returns once the score write commits; regeneration runs
//! detached and is never awaited by the caller.

use serde::Serialize;
use serde_json::Value;

use crate::domain::events::{Event, EventName};
use crate::domain::foundation::{
    ComponentId, DomainError, ErrorCode, SessionId, Timestamp, UserId,
};
use crate::domain::tenant::Business;
use crate::domain::variants::{RegenerationCheck, SlotLabel, VariantKey};
use crate::ports::{CasOutcome, UserStore, VariantStore};

use super::services::Services;

/// Score-update attempts before surfacing the conflict.
const REWARD_CAS_ATTEMPTS: u32 = 2;

/// One reward request, after DTO decoding.
#[derive(Debug, Clone)]
pub struct RewardCommand {
    pub user_id: String,
    pub session_id: Option<String>,
    pub slot: SlotLabel,
    /// Explicit reward value; wins over `reward_type` mapping.
    pub reward: Option<f64>,
    /// Reward type mapped through configuration when no explicit value.
    pub reward_type: Option<String>,
    pub component_ids: Vec<String>,
}

/// Post-update state for one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentScore {
    pub component_id: ComponentId,
    pub variant: SlotLabel,
    pub new_score: f64,
    pub number_of_trials: u64,
    pub regeneration_scheduled: bool,
}

/// Applies one reward to every named component record for the user.
pub async fn apply_reward(
    services: &Services,
    business: &Business,
    command: RewardCommand,
) -> Result<Vec<ComponentScore>, DomainError> {
    if command.user_id.is_empty() {
        return Err(DomainError::validation("user_id", "user_id is required"));
    }
    if command.component_ids.is_empty() {
        return Err(DomainError::validation(
            "component_ids",
            "at least one component is required",
        ));
    }
    let user_id = UserId::new(command.user_id.clone())?;

    let reward = match command.reward {
        Some(value) if value < 0.0 => {
            return Err(DomainError::validation("reward", "rewards are non-negative"));
        }
        Some(value) => value,
        None => services
            .bandit
            .reward_for(command.reward_type.as_deref().unwrap_or("click")),
    };

    let policy = services.selection_for(business.tier);
    let mut results = Vec::with_capacity(command.component_ids.len());
    for raw_component in &command.component_ids {
        let component_id = ComponentId::new(raw_component.clone())?;
        let key = VariantKey::new(
            business.business_id.clone(),
            user_id.clone(),
            component_id.clone(),
        );
        let score = reward_one(services, policy, &key, command.slot, reward).await?;
        results.push(score);
    }

    record_reward_event(services, business, &user_id, &command, reward).await;

    Ok(results)
}

/// Applies the reward to one record: CAS with one transparent retry, then
/// the regeneration check.
async fn reward_one(
    services: &Services,
    policy: crate::domain::variants::SelectionPolicy,
    key: &VariantKey,
    slot: SlotLabel,
    reward: f64,
) -> Result<ComponentScore, DomainError> {
    let mut record = services.variants.get(key).await?.ok_or_else(|| {
        DomainError::new(
            ErrorCode::VariantNotFound,
            format!("no variant record for component '{}'", key.component_id),
        )
    })?;

    for attempt in 1..=REWARD_CAS_ATTEMPTS {
        let live = record.slot(slot);
        let expected = live.version();

        let mut updated = live.clone();
        updated.apply_reward(reward);

        let outcome = services
            .variants
            .update_slot(
                key,
                slot,
                expected,
                updated.current_score,
                updated.number_of_trials,
            )
            .await?;

        match outcome {
            CasOutcome::Committed => {
                let mut committed = record.clone();
                *committed.slot_mut(slot) = updated.clone();

                let regeneration_scheduled =
                    maybe_regenerate(services, policy, key, &committed).await;

                return Ok(ComponentScore {
                    component_id: key.component_id.clone(),
                    variant: slot,
                    new_score: updated.current_score,
                    number_of_trials: updated.number_of_trials,
                    regeneration_scheduled,
                });
            }
            CasOutcome::Conflict { current } => {
                if attempt == REWARD_CAS_ATTEMPTS {
                    let live = current.slot(slot);
                    return Err(DomainError::conflict(
                        "score update lost the race twice",
                    )
                    .with_detail("component_id", key.component_id.to_string())
                    .with_detail("current_score", live.current_score.to_string())
                    .with_detail("number_of_trials", live.number_of_trials.to_string()));
                }
                record = current;
            }
        }
    }
    unreachable!("reward CAS loop always returns")
}

/// Checks divergence and fires the detached regeneration job.
async fn maybe_regenerate(
    services: &Services,
    policy: crate::domain::variants::SelectionPolicy,
    key: &VariantKey,
    record: &crate::domain::variants::VariantRecord,
) -> bool {
    let RegenerationCheck::Regenerate { loser } = policy.regeneration_check(record) else {
        return false;
    };

    // The most recent classification feeds the rewrite prompt; a user who
    // never ran the optimize path regenerates with neutral context.
    let (identity_state, vector) = match services.users.find(&key.business_id, &key.user_id).await
    {
        Ok(Some(profile)) => profile
            .last_session
            .map(|s| (s.identity_state, s.behavioral_vector))
            .unwrap_or_else(neutral_context),
        _ => neutral_context(),
    };

    services
        .regeneration
        .schedule(key.clone(), loser, identity_state, vector)
        .await
}

fn neutral_context() -> (
    crate::domain::behavior::IdentityState,
    crate::domain::behavior::BehavioralVector,
) {
    (
        crate::domain::behavior::IdentityState::Exploratory,
        crate::domain::behavior::BehavioralVector::neutral(),
    )
}

/// Best-effort conversion event so rewards appear in the journey.
async fn record_reward_event(
    services: &Services,
    business: &Business,
    user_id: &UserId,
    command: &RewardCommand,
    reward: f64,
) {
    let session_id = command
        .session_id
        .clone()
        .filter(|s| !s.is_empty())
        .and_then(|s| SessionId::new(s).ok())
        .unwrap_or_else(SessionId::mint);

    let event = Event::new(
        business.business_id.clone(),
        user_id.clone(),
        session_id,
        EventName::ConversionCompleted,
        Timestamp::now(),
    )
    .with_property("variant", Value::String(command.slot.to_string()))
    .with_property("reward", Value::from(reward))
    .with_property(
        "reward_type",
        Value::String(
            command
                .reward_type
                .clone()
                .unwrap_or_else(|| "click".to_string()),
        ),
    );

    if let Err(e) = services.ingestor.record_context_event(event).await {
        tracing::warn!(error = %e, "failed to record reward event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockProvider;
    use crate::adapters::memory::{
        InMemoryAgreementStore, InMemoryBusinessStore, InMemoryEventStore,
        InMemoryGlobalUserStore, InMemoryUserStore, InMemoryVariantStore,
    };
    use crate::adapters::rate_limiter::TokenBucketLimiter;
    use crate::application::services::{EngineMode, Stores};
    use crate::config::AppConfig;
    use crate::domain::tenant::BusinessTier;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_services() -> (Services, Business) {
        let config = AppConfig::default();
        let stores = Stores {
            businesses: Arc::new(InMemoryBusinessStore::new()),
            events: Arc::new(InMemoryEventStore::new()),
            users: Arc::new(InMemoryUserStore::new()),
            variants: Arc::new(InMemoryVariantStore::new()),
            global_users: Arc::new(InMemoryGlobalUserStore::new()),
            agreements: Arc::new(InMemoryAgreementStore::new()),
        };
        let services = Services::build(
            &config,
            stores,
            Arc::new(MockProvider::new()),
            Arc::new(TokenBucketLimiter::new(20, 40)),
            EngineMode::Stub,
        );
        let business = Business::register("Shoes", "shoes.test", vec![], BusinessTier::Free);
        (services, business)
    }

    fn key(business: &Business) -> VariantKey {
        VariantKey::new(
            business.business_id.clone(),
            UserId::new("user_1").unwrap(),
            ComponentId::new("hero").unwrap(),
        )
    }

    fn reward_command(value: f64) -> RewardCommand {
        RewardCommand {
            user_id: "user_1".to_string(),
            session_id: None,
            slot: SlotLabel::A,
            reward: Some(value),
            reward_type: None,
            component_ids: vec!["hero".to_string()],
        }
    }

    #[tokio::test]
    async fn first_reward_after_one_trial_sets_score_to_reward() {
        let (services, business) = test_services();
        let key = key(&business);
        services
            .variants
            .get_or_init(&key, "<h1>Welcome</h1>")
            .await
            .unwrap();
        services
            .variants
            .update_slot(&key, SlotLabel::A, (0.0, 0), 0.0, 1)
            .await
            .unwrap();

        let scores = apply_reward(&services, &business, reward_command(1.0))
            .await
            .unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].new_score, 1.0);
        assert_eq!(scores[0].number_of_trials, 1);

        let record = services.variants.get(&key).await.unwrap().unwrap();
        assert_eq!(record.slot_a.current_score, 1.0);
        assert_eq!(record.slot_b.current_score, 0.0);
    }

    #[tokio::test]
    async fn reward_type_maps_through_configuration() {
        let (services, business) = test_services();
        let key = key(&business);
        services
            .variants
            .get_or_init(&key, "<div/>")
            .await
            .unwrap();
        services
            .variants
            .update_slot(&key, SlotLabel::A, (0.0, 0), 0.0, 1)
            .await
            .unwrap();

        let mut cmd = reward_command(0.0);
        cmd.reward = None;
        cmd.reward_type = Some("add_to_cart".to_string());

        let scores = apply_reward(&services, &business, cmd).await.unwrap();
        assert_eq!(scores[0].new_score, 5.0);
    }

    #[tokio::test]
    async fn reward_for_missing_record_is_not_found() {
        let (services, business) = test_services();
        let err = apply_reward(&services, &business, reward_command(1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VariantNotFound);
    }

    #[tokio::test]
    async fn negative_rewards_are_rejected() {
        let (services, business) = test_services();
        let err = apply_reward(&services, &business, reward_command(-1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn reward_applies_to_every_named_component() {
        let (services, business) = test_services();
        for component in ["hero", "pricing"] {
            let key = VariantKey::new(
                business.business_id.clone(),
                UserId::new("user_1").unwrap(),
                ComponentId::new(component).unwrap(),
            );
            services.variants.get_or_init(&key, "<div/>").await.unwrap();
            services
                .variants
                .update_slot(&key, SlotLabel::A, (0.0, 0), 0.0, 1)
                .await
                .unwrap();
        }

        let mut cmd = reward_command(2.0);
        cmd.component_ids = vec!["hero".to_string(), "pricing".to_string()];

        let scores = apply_reward(&services, &business, cmd).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.new_score == 2.0));
    }

    #[tokio::test]
    async fn divergence_past_the_gap_schedules_regeneration() {
        let (services, business) = test_services();
        let key = key(&business);
        services
            .variants
            .get_or_init(&key, "<h1>Welcome</h1>")
            .await
            .unwrap();

        // Five trials each; A at 3.0, B at 1.5
        services
            .variants
            .update_slot(&key, SlotLabel::A, (0.0, 0), 3.0, 5)
            .await
            .unwrap();
        services
            .variants
            .update_slot(&key, SlotLabel::B, (0.0, 0), 1.5, 5)
            .await
            .unwrap();

        let scores = apply_reward(&services, &business, reward_command(3.0))
            .await
            .unwrap();
        assert!(scores[0].regeneration_scheduled);

        // The regenerated B slot archives its 1.5-score markup
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let record = services.variants.get(&key).await.unwrap().unwrap();
            if !record.slot_b.history.is_empty() {
                assert_eq!(record.slot_b.history[0].score, 1.5);
                assert_eq!(record.slot_b.history[0].html, "<h1>Welcome</h1>");
                assert_eq!(record.slot_b.current_score, 0.0);
                assert_eq!(record.slot_b.number_of_trials, 0);
                return;
            }
        }
        panic!("regeneration did not complete");
    }

    #[tokio::test]
    async fn below_minimum_trials_no_regeneration() {
        let (services, business) = test_services();
        let key = key(&business);
        services
            .variants
            .get_or_init(&key, "<div/>")
            .await
            .unwrap();
        services
            .variants
            .update_slot(&key, SlotLabel::A, (0.0, 0), 3.0, 4)
            .await
            .unwrap();
        services
            .variants
            .update_slot(&key, SlotLabel::B, (0.0, 0), 0.5, 5)
            .await
            .unwrap();

        let scores = apply_reward(&services, &business, reward_command(3.0))
            .await
            .unwrap();
        assert!(!scores[0].regeneration_scheduled);
    }
}
