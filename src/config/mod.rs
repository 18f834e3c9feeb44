//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Nested values use the `UPLIFT__` prefix
//! with `__` separators (e.g. `UPLIFT__SERVER__PORT=8080`); the short
//! deployment variables `LLM_API_KEY`, `STORAGE_URI`, `EPSILON`,
//! `REGEN_GAP`, `MIN_TRIALS`, and `REQUEST_DEADLINE_MS` override their
//! nested counterparts. Configuration is loaded once at startup and is
//! immutable thereafter.
//!
//! # Example
//!
//! ```no_run
//! use uplift::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod bandit;
mod error;
mod limits;
mod server;
mod storage;

pub use ai::AiConfig;
pub use bandit::{BanditConfig, GuardrailConfig};
pub use error::{ConfigError, ValidationError};
pub use limits::LimitsConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;

use serde::Deserialize;
use std::env;

/// Root application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server binding.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// LLM provider.
    #[serde(default)]
    pub ai: AiConfig,

    /// Bandit, rewards, and request deadline.
    #[serde(default)]
    pub bandit: BanditConfig,

    /// Guardrail content policy.
    #[serde(default)]
    pub guardrail: GuardrailConfig,

    /// Rate limits and ingest back-pressure.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` when present, reads `UPLIFT__`-prefixed nested values,
    /// then applies the short deployment variables as overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config: AppConfig = config::Config::builder()
            .add_source(config::Environment::default().prefix("UPLIFT").separator("__"))
            .build()?
            .try_deserialize()?;

        config.apply_flat_overrides();
        Ok(config)
    }

    /// Applies the short, documented deployment variables.
    fn apply_flat_overrides(&mut self) {
        if let Ok(key) = env::var("LLM_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Ok(uri) = env::var("STORAGE_URI") {
            self.storage.uri = Some(uri);
        }
        if let Some(epsilon) = parse_env("EPSILON") {
            self.bandit.epsilon = Some(epsilon);
        }
        if let Some(gap) = parse_env("REGEN_GAP") {
            self.bandit.regen_gap = gap;
        }
        if let Some(min_trials) = parse_env("MIN_TRIALS") {
            self.bandit.min_trials = min_trials;
        }
        if let Some(deadline) = parse_env("REQUEST_DEADLINE_MS") {
            self.bandit.request_deadline_ms = deadline;
        }
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.ai.validate()?;
        self.bandit.validate()?;
        self.guardrail.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for name in [
            "LLM_API_KEY",
            "STORAGE_URI",
            "EPSILON",
            "REGEN_GAP",
            "MIN_TRIALS",
            "REQUEST_DEADLINE_MS",
            "UPLIFT__SERVER__PORT",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_without_env_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = AppConfig::load().unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(!config.storage.is_durable());
        assert!(!config.ai.has_provider());
        assert_eq!(config.bandit.epsilon, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flat_overrides_take_effect() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("LLM_API_KEY", "sk-ant-test");
        env::set_var("EPSILON", "0.05");
        env::set_var("MIN_TRIALS", "9");
        env::set_var("REGEN_GAP", "2.5");
        env::set_var("REQUEST_DEADLINE_MS", "750");

        let config = AppConfig::load().unwrap();
        clear_env();

        assert!(config.ai.has_provider());
        assert_eq!(config.bandit.epsilon, Some(0.05));
        assert_eq!(config.bandit.min_trials, 9);
        assert_eq!(config.bandit.regen_gap, 2.5);
        assert_eq!(config.bandit.request_deadline_ms, 750);
    }

    #[test]
    fn nested_form_configures_the_server() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("UPLIFT__SERVER__PORT", "8080");

        let config = AppConfig::load().unwrap();
        clear_env();

        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn unparseable_override_is_ignored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EPSILON", "lots");

        let config = AppConfig::load().unwrap();
        clear_env();

        assert_eq!(config.bandit.epsilon, None);
    }
}
