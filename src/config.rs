//! Collector configuration.
//!
//! Pool sizing is a startup-time decision: the refill heuristic divides
//! the pool into quarters and the cursor masks with the pool size, so
//! both constraints are validated before the subsystem can start.

use crate::crediting::{DEFAULT_ENTROPY_RATE, SECURITY_STRENGTH_BITS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration for the jitter entropy collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Credited entropy bits per [`SECURITY_STRENGTH_BITS`] data bits.
    /// Zero excludes the source from crediting.
    pub entropy_rate: u32,
    /// Whether background prefetching starts enabled.
    pub async_enabled: bool,
    /// Compliance mode: force full crediting at initialization unless
    /// the rate was explicitly configured away from the default.
    pub compliance_mode: bool,
    /// Number of prefetch slots; a power of two, at least 4.
    pub pool_blocks: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            entropy_rate: DEFAULT_ENTROPY_RATE,
            async_enabled: true,
            compliance_mode: false,
            pool_blocks: 64,
        }
    }
}

impl CollectorConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pool_blocks.is_power_of_two() {
            return Err(ConfigError::PoolNotPowerOfTwo(self.pool_blocks));
        }
        if self.pool_blocks < 4 {
            return Err(ConfigError::PoolTooSmall(self.pool_blocks));
        }
        if self.entropy_rate > SECURITY_STRENGTH_BITS {
            return Err(ConfigError::RateTooHigh(self.entropy_rate));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("pool size {0} is not a power of two")]
    PoolNotPowerOfTwo(usize),
    #[error("pool size {0} is below the minimum of 4 slots")]
    PoolTooSmall(usize),
    #[error("entropy rate {0} exceeds full crediting")]
    RateTooHigh(u32),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Demo binary output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Run continuously (true) or issue a fixed number of requests.
    pub continuous: bool,
    /// Number of requests to issue if not continuous.
    pub request_count: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            request_count: 16,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.collector.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CollectorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_power_of_two_pool_invalid() {
        let config = CollectorConfig {
            pool_blocks: 12,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PoolNotPowerOfTwo(12))
        ));
    }

    #[test]
    fn test_undersized_pool_invalid() {
        let config = CollectorConfig {
            pool_blocks: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PoolTooSmall(2))));
    }

    #[test]
    fn test_excessive_rate_invalid() {
        let config = CollectorConfig {
            entropy_rate: 512,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RateTooHigh(512))
        ));
    }

    #[test]
    fn test_toml_sections_parse() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [collector]
            entropy_rate = 256
            async_enabled = false
            compliance_mode = true
            pool_blocks = 8

            [output]
            continuous = true
            request_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(parsed.collector.entropy_rate, 256);
        assert!(!parsed.collector.async_enabled);
        assert!(parsed.collector.compliance_mode);
        assert_eq!(parsed.collector.pool_blocks, 8);
        assert!(parsed.output.continuous);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let parsed: FileConfig = toml::from_str("").unwrap();
        assert_eq!(
            parsed.collector.entropy_rate,
            CollectorConfig::default().entropy_rate
        );
        assert_eq!(parsed.output.request_count, 16);
    }
}
