//! Routes for cross-site sync.

use axum::routing::post;
use axum::Router;

use super::super::AppState;
use super::handlers::link;

pub fn routes() -> Router<AppState> {
    Router::new().route("/sync/link", post(link))
}
