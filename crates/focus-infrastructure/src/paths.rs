//! Centralized path management.

use focus_core::error::{FocusError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "focus";
const CONFIG_FILE: &str = "config.toml";

/// Resolves where Focus keeps its files.
///
/// An explicit base directory overrides the platform config directory, which
/// keeps tests away from the user's real configuration.
#[derive(Debug, Clone, Default)]
pub struct FocusPaths {
    base_dir: Option<PathBuf>,
}

impl FocusPaths {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// `~/.config/focus` on Linux, or the override.
    pub fn config_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| FocusError::config("Could not determine config directory")),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join(CONFIG_FILE))
    }
}
