//! Engine configuration model.
//!
//! Loaded from TOML by the infrastructure layer; every section and field is
//! optional and falls back to the defaults below.

use crate::error::{FocusError, Result};
use crate::room_code::DEFAULT_MAX_RETRIES;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct FocusConfig {
    pub room_code: RoomCodeSettings,
    pub runner: RunnerSettings,
    pub presence: PresenceSettings,
    pub logging: LoggingSettings,
}

impl FocusConfig {
    /// Parses TOML, filling in defaults for anything omitted.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FocusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runner.tick_interval_ms == 0 {
            return Err(FocusError::config("runner.tick_interval_ms must be greater than zero"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(FocusError::config("logging.level must not be empty"));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RoomCodeSettings {
    /// Retries after the first colliding code
    pub max_retries: u32,
}

impl Default for RoomCodeSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Auto-complete polling interval
    pub tick_interval_ms: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PresenceSettings {
    /// Absences shorter than this are not recorded
    pub min_reportable_seconds: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            min_reportable_seconds: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
