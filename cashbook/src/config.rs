//! Configuration for the cash-book core

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cash-book configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Retry policy for contended summary writes
    pub retry: RetryConfig,

    /// Input validation limits
    pub validation: ValidationConfig,
}

/// Retry policy for compare-and-swap conflicts on daily summaries
///
/// Delay before attempt n+1 is `base_delay_ms * 2^(n-1)` plus uniform
/// jitter in `[0, jitter_ms)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts before surfacing the conflict
    pub max_attempts: u32,

    /// Base delay (milliseconds)
    pub base_delay_ms: u64,

    /// Jitter ceiling (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            jitter_ms: 100,
        }
    }
}

/// Input validation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// How far into the future a movement date may lie (days)
    pub future_date_grace_days: i64,

    /// Ceiling for manual opening-balance overrides
    pub max_opening_balance: Decimal,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            future_date_grace_days: 1,
            // Far above any plausible till balance for this business
            max_opening_balance: Decimal::new(100_000_000_00, 2),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(attempts) = std::env::var("CASHBOOK_MAX_RETRY_ATTEMPTS") {
            config.retry.max_attempts = attempts
                .parse()
                .map_err(|_| crate::Error::Config("CASHBOOK_MAX_RETRY_ATTEMPTS must be a number".to_string()))?;
        }

        if let Ok(delay) = std::env::var("CASHBOOK_RETRY_BASE_DELAY_MS") {
            config.retry.base_delay_ms = delay
                .parse()
                .map_err(|_| crate::Error::Config("CASHBOOK_RETRY_BASE_DELAY_MS must be a number".to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.validation.future_date_grace_days < 0 {
            return Err(crate::Error::Config(
                "validation.future_date_grace_days must not be negative".to_string(),
            ));
        }
        if self.validation.max_opening_balance <= Decimal::ZERO {
            return Err(crate::Error::Config(
                "validation.max_opening_balance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.validation.future_date_grace_days, 1);
    }

    #[test]
    fn test_parse_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_attempts = 5
            base_delay_ms = 50
            jitter_ms = 20

            [validation]
            future_date_grace_days = 2
            max_opening_balance = "50000.00"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.validation.max_opening_balance, Decimal::new(50000_00, 2));
    }
}
