//! Shared harness for the HTTP integration tests: in-memory stores, a
//! seeded tenant, and request helpers.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use uplift::adapters::ai::MockProvider;
use uplift::adapters::http::{router, AppState};
use uplift::adapters::memory::{
    InMemoryAgreementStore, InMemoryBusinessStore, InMemoryEventStore, InMemoryGlobalUserStore,
    InMemoryUserStore, InMemoryVariantStore,
};
use uplift::adapters::rate_limiter::TokenBucketLimiter;
use uplift::application::{EngineMode, Services, Stores};
use uplift::config::AppConfig;
use uplift::domain::tenant::{Business, BusinessTier};
use uplift::ports::BusinessStore;

pub struct TestApp {
    pub app: Router,
    pub services: Services,
    pub business: Business,
    pub businesses: Arc<InMemoryBusinessStore>,
    pub events: Arc<InMemoryEventStore>,
}

/// Builds an app with default configuration and a seeded Free tenant.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

/// Builds an app with custom configuration.
pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let businesses = Arc::new(InMemoryBusinessStore::new());
    let events = Arc::new(InMemoryEventStore::new());

    let business = Business::register("Shoes", "shoes.test", vec![], BusinessTier::Free);
    businesses.insert(&business).await.unwrap();

    let stores = Stores {
        businesses: businesses.clone(),
        events: events.clone(),
        users: Arc::new(InMemoryUserStore::new()),
        variants: Arc::new(InMemoryVariantStore::new()),
        global_users: Arc::new(InMemoryGlobalUserStore::new()),
        agreements: Arc::new(InMemoryAgreementStore::new()),
    };
    let services = Services::build(
        &config,
        stores,
        Arc::new(MockProvider::new()),
        Arc::new(TokenBucketLimiter::new(
            config.limits.high_frequency_per_second,
            config.limits.high_frequency_per_second * 2,
        )),
        EngineMode::Stub,
    );

    let state = AppState::new(
        services.clone(),
        Arc::new(TokenBucketLimiter::new(
            config.limits.requests_per_second,
            config.limits.burst,
        )),
    );

    TestApp {
        app: router(state),
        services,
        business,
        businesses,
        events,
    }
}

impl TestApp {
    /// Sends an authenticated POST with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> Response<Body> {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("Content-Type", "application/json")
                    .header("X-API-Key", &self.business.api_key)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Sends an authenticated GET.
    pub async fn get(&self, path: &str) -> Response<Body> {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(path)
                    .header("X-API-Key", &self.business.api_key)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Asserts the status and returns the JSON body.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
