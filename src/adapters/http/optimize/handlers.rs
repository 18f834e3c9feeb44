//! Handlers for the optimize endpoints.

use axum::extract::State;
use axum::{Extension, Json};

use crate::application::optimize;
use crate::domain::tenant::Business;

use super::super::error::ApiError;
use super::super::AppState;
use super::dto::{OptimizeRequest, OptimizeResponse};

/// POST `/api/optimize` (and legacy `/tagAi`).
///
/// Runs the full pipeline: identity resolution, synthetic view event,
/// behavioral aggregation, classification, ε-greedy selection, and
/// guardrail validation, all inside the request's soft deadline.
pub async fn optimize_component(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let outcome = optimize(&state.services, &business, request.into()).await?;
    Ok(Json(outcome.into()))
}
