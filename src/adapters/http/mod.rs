//! HTTP surface: routers, DTOs, handlers, and middleware.
//!
//! Authentication is an `X-API-Key` header resolved to a tenant by the
//! auth middleware; handlers receive the tenant from request extensions.
//! The health endpoint is the only unauthenticated route.

pub mod analytics;
pub mod error;
pub mod events;
pub mod middleware;
pub mod optimize;
pub mod rewards;
pub mod sync;

use axum::extract::State;
use axum::routing::get;
use axum::{middleware as axum_middleware, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::application::{EngineMode, Services};
use crate::ports::RateLimiter;

/// Service name reported by the health endpoint.
const SERVICE_NAME: &str = "uplift";

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub edge_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(services: Services, edge_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            services,
            edge_limiter,
        }
    }
}

/// Health and mode report.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    mode: EngineMode,
    agents: [&'static str; 4],
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        mode: state.services.mode,
        agents: ["Analytics", "Identity", "Decision", "Guardrail"],
    })
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(optimize::routes())
        .merge(rewards::routes())
        .merge(events::routes())
        .merge(sync::routes())
        .merge(analytics::routes())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
