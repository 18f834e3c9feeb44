//! Rate limiting and ingest back-pressure configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Edge rate limits and ingest queue sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Sustained per-api-key request rate.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Per-api-key burst capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// High-frequency events admitted per second per (user, session).
    #[serde(default = "default_high_frequency_per_second")]
    pub high_frequency_per_second: u32,
    /// Capacity of the event write queue.
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,
    /// Queue depth above which throttle-class events are shed.
    #[serde(default = "default_ingest_queue_watermark")]
    pub ingest_queue_watermark: usize,
}

fn default_requests_per_second() -> u32 {
    100
}

fn default_burst() -> u32 {
    200
}

fn default_high_frequency_per_second() -> u32 {
    20
}

fn default_ingest_queue_capacity() -> usize {
    4_096
}

fn default_ingest_queue_watermark() -> usize {
    3_072
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            high_frequency_per_second: default_high_frequency_per_second(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
            ingest_queue_watermark: default_ingest_queue_watermark(),
        }
    }
}

impl LimitsConfig {
    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.requests_per_second == 0 {
            return Err(ValidationError::invalid(
                "limits.requests_per_second",
                "must be at least 1",
            ));
        }
        if self.burst < self.requests_per_second {
            return Err(ValidationError::invalid(
                "limits.burst",
                "must be at least the sustained rate",
            ));
        }
        if self.ingest_queue_watermark >= self.ingest_queue_capacity {
            return Err(ValidationError::invalid(
                "limits.ingest_queue_watermark",
                "must be below the queue capacity",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LimitsConfig::default();
        assert_eq!(config.requests_per_second, 100);
        assert_eq!(config.burst, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn burst_below_rate_fails_validation() {
        let config = LimitsConfig {
            requests_per_second: 100,
            burst: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn watermark_at_capacity_fails_validation() {
        let config = LimitsConfig {
            ingest_queue_capacity: 100,
            ingest_queue_watermark: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
