//! Shared request budget configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide request budget for the source API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window across all workers
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Fraction of the budget at which workers start self-throttling
    #[serde(default = "default_throttle_ratio")]
    pub throttle_ratio: f32,

    /// Pause applied when the source signals a limit without a retry-after
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests(),
            window_secs: default_window_secs(),
            throttle_ratio: default_throttle_ratio(),
            default_retry_after_secs: default_retry_after_secs(),
        }
    }
}

impl crate::validation::Validate for RateLimitConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{invalid, validate_positive};

        validate_positive("rate_limit.max_requests_per_window", self.max_requests_per_window)?;
        validate_positive("rate_limit.window_secs", self.window_secs)?;
        if !(self.throttle_ratio > 0.0 && self.throttle_ratio <= 1.0) {
            return Err(invalid(
                "rate_limit.throttle_ratio",
                format!("must be in (0, 1], got {}", self.throttle_ratio),
            ));
        }
        Ok(())
    }
}

fn default_max_requests() -> u64 {
    5000
}

fn default_window_secs() -> u64 {
    3600
}

fn default_throttle_ratio() -> f32 {
    0.9
}

fn default_retry_after_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_default_is_valid() {
        assert!(RateLimitConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ratio_invalid() {
        let config = RateLimitConfig {
            throttle_ratio: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_duration() {
        let config = RateLimitConfig {
            window_secs: 90,
            ..Default::default()
        };
        assert_eq!(config.window(), Duration::from_secs(90));
    }
}
