//! Routes for the optimize endpoints.

use axum::routing::post;
use axum::Router;

use super::super::AppState;
use super::handlers::optimize_component;

/// The current path and its legacy alias share one handler; parity is at
/// the response-field level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/optimize", post(optimize_component))
        .route("/tagAi", post(optimize_component))
}
