//! Wire mapping of domain errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};

/// The JSON error envelope: `{error, detail}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// A domain error plus its HTTP status.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::QuotaExceeded => StatusCode::FORBIDDEN,
            ErrorCode::BusinessNotFound
            | ErrorCode::UserNotFound
            | ErrorCode::VariantNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ConcurrencyConflict => StatusCode::CONFLICT,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ProviderError
            | ErrorCode::DeadlineExceeded
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, "{}", self.0.message);
        }

        let mut detail = self.0.message.clone();
        if !self.0.details.is_empty() {
            let mut extras: Vec<String> = self
                .0
                .details
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            extras.sort();
            detail = format!("{detail} ({})", extras.join(", "));
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.code.as_str().to_string(),
                detail,
            }),
        )
            .into_response()
    }
}
