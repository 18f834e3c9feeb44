//! Routes for event ingestion.

use axum::routing::post;
use axum::Router;

use super::super::AppState;
use super::handlers::{track_event, track_events_batch};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/events/track", post(track_event))
        .route("/api/events/batch", post(track_events_batch))
}
