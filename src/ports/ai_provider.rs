//! AI Provider Port - Interface for the LLM rewrite loop.
//!
//! Abstracts the language model used to mutate a losing variant into a new
//! candidate, keeping the regeneration engine decoupled from any specific
//! provider. The mock implementation backs stub mode and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::behavior::{BehavioralVector, IdentityState};
use crate::domain::foundation::ComponentId;

/// Port for LLM-backed variant rewrites.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Produces a candidate replacement for the losing slot's markup.
    async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, AiError>;

    /// Provider information (name, model).
    fn provider_info(&self) -> ProviderInfo;
}

/// Everything the model needs to improve on the losing candidate.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    /// The site author's original fragment.
    pub seed_html: String,
    /// The markup currently losing.
    pub losing_html: String,
    /// The markup currently winning, as a style reference.
    pub winning_html: String,
    /// The user's classified identity state.
    pub identity_state: IdentityState,
    /// The behavioral vector behind the classification.
    pub behavioral_vector: BehavioralVector,
    /// Component being optimized.
    pub component_id: ComponentId,
}

/// The model's candidate markup.
#[derive(Debug, Clone)]
pub struct RewriteResponse {
    pub html: String,
    pub model: String,
}

/// Provider information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g. "anthropic", "mock").
    pub name: String,
    /// Model identifier.
    pub model: String,
}

impl ProviderInfo {
    /// Creates new provider info.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// AI provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// Rate limited by the provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during the request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The model's output was unusable (empty or filtered).
    #[error("unusable completion: {0}")]
    UnusableCompletion(String),

    /// Request exceeded the regeneration deadline.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl AiError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited { .. }
                | AiError::Unavailable { .. }
                | AiError::Network(_)
                | AiError::Timeout { .. }
        )
    }
}
