//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request validation
    Validation,

    // Authentication / authorization
    Unauthorized,
    Forbidden,
    QuotaExceeded,
    RateLimited,

    // Not found
    BusinessNotFound,
    UserNotFound,
    VariantNotFound,

    // Concurrency
    ConcurrencyConflict,

    // Infrastructure
    StorageUnavailable,
    ProviderError,
    DeadlineExceeded,
    InternalError,
}

impl ErrorCode {
    /// Stable wire identifier for the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_FAILED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::BusinessNotFound => "BUSINESS_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::VariantNotFound => "VARIANT_NOT_FOUND",
            ErrorCode::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message).with_detail("field", field)
    }

    /// Creates a storage-unavailable error after retries are exhausted.
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageUnavailable, message)
    }

    /// Creates a concurrency-conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConcurrencyConflict, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns true when the error represents a transient storage fault
    /// worth retrying inside the persistence layer.
    pub fn is_transient(&self) -> bool {
        matches!(self.code, ErrorCode::StorageUnavailable)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::VariantNotFound, "no record for hero");
        assert_eq!(format!("{}", err), "[VARIANT_NOT_FOUND] no record for hero");
    }

    #[test]
    fn validation_error_carries_field_detail() {
        let err = DomainError::validation("changingHtml", "fragment exceeds size bound");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.details.get("field"), Some(&"changingHtml".to_string()));
    }

    #[test]
    fn with_detail_accumulates_details() {
        let err = DomainError::conflict("score update lost the race")
            .with_detail("slot", "A")
            .with_detail("component_id", "hero");

        assert_eq!(err.details.len(), 2);
        assert_eq!(err.details.get("slot"), Some(&"A".to_string()));
    }

    #[test]
    fn transient_classification_covers_storage_only() {
        assert!(DomainError::storage_unavailable("pool timeout").is_transient());
        assert!(!DomainError::unauthorized("bad key").is_transient());
        assert!(!DomainError::conflict("cas miss").is_transient());
    }

    #[test]
    fn error_code_wire_names_are_stable() {
        assert_eq!(ErrorCode::QuotaExceeded.as_str(), "QUOTA_EXCEEDED");
        assert_eq!(ErrorCode::StorageUnavailable.as_str(), "STORAGE_UNAVAILABLE");
        assert_eq!(ErrorCode::DeadlineExceeded.as_str(), "DEADLINE_EXCEEDED");
    }
}
