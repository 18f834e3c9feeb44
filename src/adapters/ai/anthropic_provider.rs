//! Anthropic Provider - AiProvider implementation over the Claude
//! messages API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = AnthropicConfig::new(api_key)
//!     .with_model("claude-sonnet-4-20250514")
//!     .with_base_url("https://api.anthropic.com");
//!
//! let provider = AnthropicProvider::new(config);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{AiError, AiProvider, ProviderInfo, RewriteRequest, RewriteResponse};

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use for rewrites.
    pub model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Anthropic API provider implementation.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

const SYSTEM_PROMPT: &str = "\
You are a conversion-rate optimizer rewriting one HTML fragment of an \
e-commerce page. You receive the site author's original fragment, the \
variant currently losing, the variant currently winning, and a summary of \
the visitor's behavior. Produce ONE improved replacement for the losing \
variant.

Rules:
- Return ONLY the HTML fragment, no commentary and no code fences.
- Keep the fragment's top-level element and every data-ai-* attribute.
- No <script>, <iframe>, inline event handlers, or javascript: URLs.
- Keep roughly the same length and structure as the original.";

impl AnthropicProvider {
    /// Creates a new Anthropic provider with the given configuration.
    pub fn new(config: AnthropicConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn build_request(&self, request: &RewriteRequest) -> AnthropicRequest {
        let vector = &request.behavioral_vector;
        let user_prompt = format!(
            "Component: {component}\n\
             Visitor identity state: {identity}\n\
             Behavioral vector: exploration={exploration:.2}, \
             hesitation={hesitation:.2}, engagement={engagement:.2}, \
             velocity={velocity:.2}, focus={focus:.2}\n\n\
             Original fragment:\n{seed}\n\n\
             Losing variant (rewrite this):\n{losing}\n\n\
             Winning variant (for reference, do not copy):\n{winning}",
            component = request.component_id,
            identity = request.identity_state,
            exploration = vector.exploration_score,
            hesitation = vector.hesitation_score,
            engagement = vector.engagement_depth,
            velocity = vector.decision_velocity,
            focus = vector.content_focus_ratio,
            seed = request.seed_html,
            losing = request.losing_html,
            winning = request.winning_html,
        );

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: 2048,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_prompt,
            }],
            temperature: 0.7,
        }
    }

    async fn handle_status(&self, response: reqwest::Response) -> Result<AnthropicResponse, AiError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<AnthropicResponse>()
                .await
                .map_err(|e| AiError::parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(AiError::AuthenticationFailed),
            429 => Err(AiError::RateLimited {
                retry_after_secs: 60,
            }),
            400 => Err(AiError::UnusableCompletion(body)),
            500..=599 => Err(AiError::unavailable(format!("server error {status}: {body}"))),
            _ => Err(AiError::network(format!("unexpected status {status}: {body}"))),
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, AiError> {
        let body = self.build_request(&request);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout {
                        timeout_secs: self.config.timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    AiError::network(format!("connection failed: {e}"))
                } else {
                    AiError::network(e.to_string())
                }
            })?;

        let parsed = self.handle_status(response).await?;

        let html: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        let html = strip_code_fences(html.trim());

        if html.is_empty() {
            return Err(AiError::UnusableCompletion(
                "model returned no markup".to_string(),
            ));
        }

        Ok(RewriteResponse {
            html,
            model: if parsed.model.is_empty() {
                self.config.model.clone()
            } else {
                parsed.model
            },
        })
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("anthropic", self.config.model.clone())
    }
}

/// Models occasionally wrap output in fences despite instructions.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_prefix("html").unwrap_or(inner);
    inner
        .trim_start_matches('\n')
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::behavior::{BehavioralVector, IdentityState};
    use crate::domain::foundation::ComponentId;

    fn rewrite_request() -> RewriteRequest {
        RewriteRequest {
            seed_html: "<div data-ai-component=\"hero\">Welcome</div>".to_string(),
            losing_html: "<div data-ai-component=\"hero\">Old</div>".to_string(),
            winning_html: "<div data-ai-component=\"hero\">Winner</div>".to_string(),
            identity_state: IdentityState::Cautious,
            behavioral_vector: BehavioralVector::neutral(),
            component_id: ComponentId::new("hero").unwrap(),
        }
    }

    #[test]
    fn request_prompt_carries_all_three_fragments() {
        let provider = AnthropicProvider::new(AnthropicConfig::new("sk-ant-test"));
        let request = provider.build_request(&rewrite_request());

        assert_eq!(request.messages.len(), 1);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("Old"));
        assert!(prompt.contains("Winner"));
        assert!(prompt.contains("Welcome"));
        assert!(prompt.contains("cautious"));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```html\n<div/>\n```"), "<div/>");
        assert_eq!(strip_code_fences("```\n<div/>\n```"), "<div/>");
        assert_eq!(strip_code_fences("<div/>"), "<div/>");
    }

    #[test]
    fn config_builder_overrides_defaults() {
        let config = AnthropicConfig::new("sk-ant-test")
            .with_model("claude-3-5-haiku-latest")
            .with_base_url("http://localhost:9999")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
