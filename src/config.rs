//! Engine configuration.

use std::str::FromStr;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::oracle::RandomnessConfig;

/// What happens after a non-final segment resolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionPolicy {
    /// Request the next segment's randomness immediately
    #[default]
    AutoProgress,
    /// Park in Cooldown until an operator triggers the next segment
    ManualResume,
}

impl FromStr for ProgressionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "auto_progress" => Ok(ProgressionPolicy::AutoProgress),
            "manual" | "manual_resume" => Ok(ProgressionPolicy::ManualResume),
            other => Err(ConfigError::InvalidValue {
                key: "KICKOFF_PROGRESSION",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Variable present but unparseable
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Engine settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Progression after each non-final segment
    pub progression: ProgressionPolicy,
    /// Parameters sent with each randomness request
    pub randomness: RandomnessConfig,
}

impl EngineConfig {
    /// Defaults overridden by `KICKOFF_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("KICKOFF_PROGRESSION") {
            config.progression = value.parse()?;
        }

        if let Some(value) = lookup("KICKOFF_VRF_KEY_HASH") {
            config.randomness.key_hash = parse_key_hash(&value)?;
        }

        if let Some(value) = lookup("KICKOFF_VRF_CONFIRMATIONS") {
            config.randomness.confirmations = parse_number("KICKOFF_VRF_CONFIRMATIONS", &value)?;
        }

        if let Some(value) = lookup("KICKOFF_VRF_CALLBACK_LIMIT") {
            config.randomness.callback_limit = parse_number("KICKOFF_VRF_CALLBACK_LIMIT", &value)?;
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_key_hash(value: &str) -> Result<[u8; 32], ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "KICKOFF_VRF_KEY_HASH",
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}
