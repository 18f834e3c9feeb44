//! Routes for the admin and analytics endpoints.

use axum::routing::get;
use axum::Router;

use super::super::AppState;
use super::handlers::{all_users, analytics_dashboard, user_journey};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/all", get(all_users))
        .route("/api/user/:user_id/journey", get(user_journey))
        .route("/api/analytics/dashboard", get(analytics_dashboard))
}
