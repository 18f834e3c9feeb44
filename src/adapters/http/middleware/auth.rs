//! Tenant authentication middleware.
//!
//! Resolves the `X-API-Key` header (and the request `Origin`) to a
//! `Business` via the identity resolver and injects it into request
//! extensions. Handlers read it with `Extension<Business>`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::authenticate;

use super::super::error::ApiError;
use super::super::AppState;

/// Validates the api key and origin, injecting the tenant on success.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let api_key = header_str(&request, "X-API-Key");
    let origin = header_str(&request, "Origin");

    match authenticate(
        state.services.businesses.as_ref(),
        api_key.as_deref(),
        origin.as_deref(),
    )
    .await
    {
        Ok(business) => {
            request.extensions_mut().insert(business);
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}

fn header_str(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockProvider;
    use crate::adapters::memory::{
        InMemoryAgreementStore, InMemoryBusinessStore, InMemoryEventStore,
        InMemoryGlobalUserStore, InMemoryUserStore, InMemoryVariantStore,
    };
    use crate::adapters::rate_limiter::TokenBucketLimiter;
    use crate::application::{EngineMode, Services, Stores};
    use crate::config::AppConfig;
    use crate::domain::tenant::{Business, BusinessTier};
    use crate::ports::BusinessStore;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{middleware, Extension, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state_with_business() -> (AppState, Business) {
        let config = AppConfig::default();
        let businesses = Arc::new(InMemoryBusinessStore::new());
        let business = Business::register(
            "Shoes",
            "shoes.test",
            vec![],
            BusinessTier::Free,
        );
        businesses.insert(&business).await.unwrap();

        let stores = Stores {
            businesses,
            events: Arc::new(InMemoryEventStore::new()),
            users: Arc::new(InMemoryUserStore::new()),
            variants: Arc::new(InMemoryVariantStore::new()),
            global_users: Arc::new(InMemoryGlobalUserStore::new()),
            agreements: Arc::new(InMemoryAgreementStore::new()),
        };
        let services = Services::build(
            &config,
            stores,
            Arc::new(MockProvider::new()),
            Arc::new(TokenBucketLimiter::new(20, 40)),
            EngineMode::Stub,
        );
        (
            AppState::new(services, Arc::new(TokenBucketLimiter::new(100, 200))),
            business,
        )
    }

    async fn whoami(Extension(business): Extension<Business>) -> String {
        business.business_id.to_string()
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn valid_key_injects_the_tenant() {
        let (state, business) = state_with_business().await;
        let app = app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("X-API-Key", &business.api_key)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, business.business_id.to_string().as_bytes());
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let (state, _) = state_with_business().await;
        let response = app(state)
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn disallowed_origin_is_forbidden() {
        let (state, business) = state_with_business().await;
        let response = app(state)
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("X-API-Key", &business.api_key)
                    .header("Origin", "https://evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
