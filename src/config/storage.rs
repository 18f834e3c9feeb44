//! Persistence configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Storage configuration. Without a URI the service runs on the in-memory
/// stores, which is the keyless development setup.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Postgres connection string; absent selects in-memory storage.
    #[serde(default)]
    pub uri: Option<String>,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: None,
            max_connections: default_max_connections(),
        }
    }
}

impl StorageConfig {
    /// True when a durable backend is configured.
    pub fn is_durable(&self) -> bool {
        self.uri.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(uri) = &self.uri {
            if !uri.is_empty() && !uri.starts_with("postgres://") && !uri.starts_with("postgresql://")
            {
                return Err(ValidationError::invalid(
                    "storage.uri",
                    "must be a postgres:// connection string",
                ));
            }
        }
        if self.max_connections == 0 {
            return Err(ValidationError::invalid(
                "storage.max_connections",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_in_memory() {
        let config = StorageConfig::default();
        assert!(!config.is_durable());
    }

    #[test]
    fn postgres_uri_is_durable_and_valid() {
        let config = StorageConfig {
            uri: Some("postgres://localhost/uplift".to_string()),
            max_connections: 10,
        };
        assert!(config.is_durable());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_postgres_uri_is_rejected() {
        let config = StorageConfig {
            uri: Some("mysql://localhost/uplift".to_string()),
            max_connections: 10,
        };
        assert!(config.validate().is_err());
    }
}
