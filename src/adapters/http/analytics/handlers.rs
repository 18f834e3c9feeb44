//! Handlers for the admin and analytics endpoints. The application views
//! serialize directly; no separate DTO layer.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::application::{dashboard, journey, roster, DashboardView, JourneyView};
use crate::domain::foundation::UserId;
use crate::domain::tenant::Business;
use crate::ports::UserProfile;

use super::super::error::ApiError;
use super::super::AppState;

/// Tenant roster wrapper.
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub total_users: usize,
    pub users: Vec<UserProfile>,
}

/// GET `/api/users/all` - tenant-scoped roster.
pub async fn all_users(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
) -> Result<Json<RosterResponse>, ApiError> {
    let users = roster(&state.services, &business).await?;
    Ok(Json(RosterResponse {
        total_users: users.len(),
        users,
    }))
}

/// GET `/api/user/{user_id}/journey` - events plus variant snapshot.
pub async fn user_journey(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Path(user_id): Path<String>,
) -> Result<Json<JourneyView>, ApiError> {
    let user_id = UserId::new(user_id)?;
    let view = journey(&state.services, &business, &user_id).await?;
    Ok(Json(view))
}

/// GET `/api/analytics/dashboard` - aggregated counts and scores.
pub async fn analytics_dashboard(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
) -> Result<Json<DashboardView>, ApiError> {
    let view = dashboard(&state.services, &business).await?;
    Ok(Json(view))
}
