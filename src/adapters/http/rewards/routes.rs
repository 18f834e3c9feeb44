//! Routes for the reward endpoints.

use axum::routing::post;
use axum::Router;

use super::super::AppState;
use super::handlers::reward_component;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reward", post(reward_component))
        .route("/api/component/reward", post(reward_component))
        .route("/rewardTag", post(reward_component))
}
