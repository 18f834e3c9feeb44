//! LLM provider configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// LLM provider configuration. Without an API key the service starts in
/// stub mode: selection still runs, regeneration uses the mock provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Provider API key; absent selects stub mode.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model used for variant rewrites.
    #[serde(default = "default_model")]
    pub model: String,
    /// Provider base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Wall-clock deadline for one regeneration call, in seconds.
    #[serde(default = "default_regeneration_deadline_secs")]
    pub regeneration_deadline_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_regeneration_deadline_secs() -> u64 {
    10
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            regeneration_deadline_secs: default_regeneration_deadline_secs(),
        }
    }
}

impl AiConfig {
    /// True when a provider key is configured (multi-agent mode).
    pub fn has_provider(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.regeneration_deadline_secs == 0 {
            return Err(ValidationError::invalid(
                "ai.regeneration_deadline_secs",
                "must be at least 1",
            ));
        }
        if !self.base_url.starts_with("http") {
            return Err(ValidationError::invalid(
                "ai.base_url",
                "must be an http(s) URL",
            ));
        }
        Ok(())
    }
}
