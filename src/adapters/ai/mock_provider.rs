//! Mock AiProvider for stub mode and tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ports::{AiError, AiProvider, ProviderInfo, RewriteRequest, RewriteResponse};

/// Deterministic provider used when no LLM key is configured and in
/// tests. Produces a trivially "improved" candidate by restating the
/// losing markup with an emphasis wrapper, or fails on demand.
pub struct MockProvider {
    fail: bool,
    calls: AtomicU64,
}

impl MockProvider {
    /// A provider that always succeeds.
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicU64::new(0),
        }
    }

    /// A provider that always fails with a retryable error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of rewrite calls observed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(AiError::unavailable("mock provider configured to fail"));
        }

        let html = format!(
            "<strong data-rewrite=\"{}\">{}</strong>",
            request.identity_state, request.losing_html
        );
        Ok(RewriteResponse {
            html,
            model: "mock".to_string(),
        })
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("mock", "mock")
    }
}
