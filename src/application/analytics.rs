//! Read-only views for the admin and analytics surfaces.

use serde::Serialize;

use crate::domain::events::Event;
use crate::domain::foundation::{ComponentId, DomainError, ErrorCode, UserId};
use crate::domain::tenant::Business;
use crate::domain::variants::{SlotLabel, VariantRecord};
use crate::ports::{EventStore, UserProfile, UserStore, VariantStore};

use super::services::Services;

/// Journey query caps: a user's full event trail is bounded.
const JOURNEY_EVENT_LIMIT: usize = 100;

/// Per-slot statistics for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSlotStats {
    pub current_score: f64,
    pub number_of_trials: u64,
    pub history_count: usize,
}

/// One (user, component) record in the dashboard view.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentStats {
    pub user_id: UserId,
    pub component_id: ComponentId,
    #[serde(rename = "A")]
    pub slot_a: ComponentSlotStats,
    #[serde(rename = "B")]
    pub slot_b: ComponentSlotStats,
    pub leader: SlotLabel,
}

/// Aggregated counts and scores for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub total_users: u64,
    pub total_events: u64,
    pub total_components: usize,
    pub variant_a_wins: usize,
    pub variant_b_wins: usize,
    pub components: Vec<ComponentStats>,
}

/// A user's variant records as returned by the journey endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct VariantSnapshotView {
    pub component_id: ComponentId,
    pub variants: VariantRecord,
}

/// Events plus variant snapshot for one user.
#[derive(Debug, Clone, Serialize)]
pub struct JourneyView {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    pub events: Vec<Event>,
    pub variants: Vec<VariantSnapshotView>,
}

fn slot_stats(record: &VariantRecord, label: SlotLabel) -> ComponentSlotStats {
    let slot = record.slot(label);
    ComponentSlotStats {
        current_score: slot.current_score,
        number_of_trials: slot.number_of_trials,
        history_count: slot.history.len(),
    }
}

/// Builds the tenant dashboard.
pub async fn dashboard(
    services: &Services,
    business: &Business,
) -> Result<DashboardView, DomainError> {
    let records = services
        .variants
        .list_for_business(&business.business_id)
        .await?;

    let mut variant_a_wins = 0;
    let mut variant_b_wins = 0;
    let components: Vec<ComponentStats> = records
        .into_iter()
        .map(|(key, record)| {
            let leader = record.leader();
            match leader {
                SlotLabel::A => variant_a_wins += 1,
                SlotLabel::B => variant_b_wins += 1,
            }
            ComponentStats {
                user_id: key.user_id,
                component_id: key.component_id,
                slot_a: slot_stats(&record, SlotLabel::A),
                slot_b: slot_stats(&record, SlotLabel::B),
                leader,
            }
        })
        .collect();

    Ok(DashboardView {
        total_users: services
            .users
            .count_for_business(&business.business_id)
            .await?,
        total_events: services
            .events
            .count_for_business(&business.business_id)
            .await?,
        total_components: components.len(),
        variant_a_wins,
        variant_b_wins,
        components,
    })
}

/// Builds the journey view for one user.
pub async fn journey(
    services: &Services,
    business: &Business,
    user_id: &UserId,
) -> Result<JourneyView, DomainError> {
    let profile = services.users.find(&business.business_id, user_id).await?;
    let variants = services
        .variants
        .list_for_user(&business.business_id, user_id)
        .await?;

    if profile.is_none() && variants.is_empty() {
        return Err(DomainError::new(
            ErrorCode::UserNotFound,
            format!("unknown user '{user_id}'"),
        ));
    }

    let events = services
        .events
        .journey(&business.business_id, user_id, JOURNEY_EVENT_LIMIT)
        .await?;

    Ok(JourneyView {
        user_id: user_id.clone(),
        profile,
        events,
        variants: variants
            .into_iter()
            .map(|(key, record)| VariantSnapshotView {
                component_id: key.component_id,
                variants: record,
            })
            .collect(),
    })
}

/// Tenant roster for the admin surface.
pub async fn roster(
    services: &Services,
    business: &Business,
) -> Result<Vec<UserProfile>, DomainError> {
    services
        .users
        .list_for_business(&business.business_id)
        .await
}
