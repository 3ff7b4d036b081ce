use crate::error::EngineError;
use crate::types::enums::UnknownProgressionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff: base * 2^attempt, capped at the configured max.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub attempt_timeout_ms: u64,
    pub unknown_progression: UnknownProgressionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            attempt_timeout_ms: 10_000,
            unknown_progression: UnknownProgressionPolicy::FailOpen,
        }
    }
}

impl EngineConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|err| EngineError::Internal {
            message: format!("config parse failed: {err}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(500));
        assert_eq!(retry.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(3_000));
        assert_eq!(retry.delay_for(10), Duration::from_millis(3_000));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            attempt_timeout_ms = 2000

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.attempt_timeout_ms, 2_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(
            config.unknown_progression,
            UnknownProgressionPolicy::FailOpen
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(EngineConfig::from_toml("retry = 7").is_err());
    }
}
