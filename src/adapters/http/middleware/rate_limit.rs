//! Per-api-key rate limiting at the HTTP edge.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::ports::{RateLimitDecision, RateLimiter};

use super::super::error::ErrorBody;
use super::super::AppState;

/// Token-bucket check keyed by the raw api key. Runs before
/// authentication so over-limit callers are shed cheaply; requests
/// without a key fall through to auth's 401.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_key) = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return next.run(request).await;
    };

    match state.edge_limiter.check(&api_key).await {
        RateLimitDecision::Allowed => next.run(request).await,
        RateLimitDecision::Denied { retry_after_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after_secs.to_string())],
            Json(ErrorBody {
                error: "RATE_LIMITED".to_string(),
                detail: format!("rate limit exceeded; retry after {retry_after_secs}s"),
            }),
        )
            .into_response(),
    }
}
