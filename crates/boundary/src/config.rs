//! Engine configuration loading
//!
//! JSON layout:
//!
//! ```text
//! {
//!   "registrations": [
//!     {"alpha_id": "vol", "instrument_id": "BTC-USD",
//!      "config": {"kind": "garch", "omega": 1e-6, "alpha": 0.09, "beta": 0.9, "sigma2_init": 1e-6}}
//!   ],
//!   "batch": {"chunk_size": 1024},
//!   "health": {"probe_timeout_ms": 50}
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use helios_alphas::AlphaConfig;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration of a signal engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Estimators registered at startup, in order
    #[serde(default)]
    pub registrations: Vec<RegistrationConfig>,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub health: HealthConfig,
}

/// One `(alpha_id, instrument_id)` registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub alpha_id: String,
    pub instrument_id: String,
    pub config: AlphaConfig,
}

/// Batch processing settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows between cancellation checks
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    1024
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Health probe settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    50
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        let config = Self::from_json(&content)?;
        info!(
            "[CONFIG] loaded {} registrations from {}",
            config.registrations.len(),
            path.as_ref().display()
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::Invalid("batch.chunk_size must be >= 1".into()));
        }
        for reg in &self.registrations {
            if reg.alpha_id.is_empty() || reg.instrument_id.is_empty() {
                return Err(ConfigError::Invalid(
                    "registration needs non-empty alpha_id and instrument_id".into(),
                ));
            }
            reg.config.validate().map_err(|e| ConfigError::InvalidAlpha {
                alpha_id: reg.alpha_id.clone(),
                instrument_id: reg.instrument_id.clone(),
                error: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid alpha config for {alpha_id} on {instrument_id}: {error}")]
    InvalidAlpha {
        alpha_id: String,
        instrument_id: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_alphas::{AlphaConfig, OfiConfig};

    #[test]
    fn test_sections_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert!(config.registrations.is_empty());
        assert_eq!(config.batch.chunk_size, 1024);
        assert_eq!(config.health.probe_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_parse_registrations() {
        let json = r#"{
            "registrations": [
                {"alpha_id": "ofi", "instrument_id": "BTC-USD",
                 "config": {"kind": "ofi", "market_cap": 100.0}}
            ],
            "batch": {"chunk_size": 16}
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.batch.chunk_size, 16);
        assert_eq!(
            config.registrations[0].config,
            AlphaConfig::Ofi(OfiConfig {
                market_cap: 100.0,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let json = r#"{"registrations": [
            {"alpha_id": "ofi", "instrument_id": "BTC-USD",
             "config": {"kind": "ofi", "market_cap": -1.0}}
        ]}"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(ConfigError::InvalidAlpha { .. })
        ));
    }

    #[test]
    fn test_parse_and_io_errors() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"batch": {"chunk_size": 0}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/helios.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
