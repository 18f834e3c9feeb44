//! Handlers for event ingestion.

use axum::extract::State;
use axum::{Extension, Json};

use crate::application::{resolve_user, EventStatus, IncomingEvent};
use crate::domain::foundation::DomainError;
use crate::domain::tenant::Business;

use super::super::error::ApiError;
use super::super::AppState;
use super::dto::{
    BatchEventRequest, BatchEventResponse, TrackEventRequest, TrackEventResponse,
};

/// POST `/api/events/track` - single event.
pub async fn track_event(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Json(request): Json<TrackEventRequest>,
) -> Result<Json<TrackEventResponse>, ApiError> {
    let resolved = resolve_user(
        Some(request.user_id),
        Some(request.session_id),
        request.global_uid,
    )?;

    let event_name = request.event_name.clone();
    let outcome = state
        .services
        .ingestor
        .ingest(
            &business,
            &resolved.user_id,
            &resolved.session_id,
            resolved.global_uid.as_ref(),
            vec![IncomingEvent {
                event_name: request.event_name,
                component_id: request.component_id,
                properties: request.properties,
                timestamp: request.timestamp,
            }],
        )
        .await?;

    // Single events surface malformed input as 400 rather than a status.
    if let Some(EventStatus::Invalid(reason)) = outcome.statuses.first() {
        return Err(ApiError(DomainError::validation("event_name", reason.clone())));
    }

    Ok(Json(TrackEventResponse {
        status: "tracked",
        event_name,
    }))
}

/// POST `/api/events/batch` - batched events with per-index statuses.
pub async fn track_events_batch(
    State(state): State<AppState>,
    Extension(business): Extension<Business>,
    Json(request): Json<BatchEventRequest>,
) -> Result<Json<BatchEventResponse>, ApiError> {
    let resolved = resolve_user(
        Some(request.user_id),
        Some(request.session_id),
        request.global_uid,
    )?;

    let items: Vec<IncomingEvent> = request.events.into_iter().map(Into::into).collect();
    let outcome = state
        .services
        .ingestor
        .ingest(
            &business,
            &resolved.user_id,
            &resolved.session_id,
            resolved.global_uid.as_ref(),
            items,
        )
        .await?;

    Ok(Json(BatchEventResponse {
        status: "tracked",
        accepted: outcome.accepted,
        coalesced: outcome.coalesced,
        dropped: outcome.dropped,
        statuses: outcome.statuses,
    }))
}
