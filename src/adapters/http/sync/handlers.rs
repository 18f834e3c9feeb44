//! Handler for cross-site sync.

use axum::extract::State;
use axum::{Extension, Json};

use crate::application::link_global_user;
use crate::domain::tenant::Business;

use super::super::error::ApiError;
use super::super::AppState;
use super::dto::{SyncLinkRequest, SyncLinkResponse};

/// POST `/sync/link` - link a local uid to a global identity, minting
/// one when the client has none yet.
pub async fn link(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Json(request): Json<SyncLinkRequest>,
) -> Result<Json<SyncLinkResponse>, ApiError> {
    let linked = link_global_user(
        &state.services,
        &business,
        request.local_uid,
        request.global_uid,
    )
    .await?;

    Ok(Json(SyncLinkResponse {
        global_uid: linked.global_uid.to_string(),
        linked: true,
        linked_businesses: linked.business_uids.len(),
    }))
}
