//! Handlers for the reward endpoints.

use axum::extract::State;
use axum::{Extension, Json};

use crate::application::{apply_reward, RewardCommand};
use crate::domain::tenant::Business;

use super::super::error::ApiError;
use super::super::AppState;
use super::dto::{RewardRequest, RewardResponse};

/// POST `/api/reward` (and aliases).
///
/// Returns once the score writes commit; any triggered regeneration runs
/// detached.
pub async fn reward_component(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Json(request): Json<RewardRequest>,
) -> Result<Json<RewardResponse>, ApiError> {
    let command = RewardCommand::try_from(request)?;
    let new_scores = apply_reward(&state.services, &business, command).await?;

    Ok(Json(RewardResponse {
        status: "reward_tracked",
        new_scores,
    }))
}
