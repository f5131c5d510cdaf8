//! Configuration service implementation.
//!
//! Loads the engine configuration from `config.toml` (by default
//! `~/.config/focus/config.toml`) and caches it.

use crate::paths::FocusPaths;
use focus_core::config::FocusConfig;
use focus_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the engine configuration.
///
/// A missing file yields the defaults; a malformed file is an error from
/// [`ConfigService::load`] and falls back to the defaults (with a warning) in
/// [`ConfigService::get_config`].
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<FocusConfig>>>,
}

impl ConfigService {
    /// Service reading the default config location.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(FocusPaths::default().config_file()?))
    }

    /// Service reading an explicit file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the file, bypassing the cache.
    pub async fn load(&self) -> Result<FocusConfig> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let config = FocusConfig::from_toml_str(&content)?;
                tracing::debug!("[ConfigService] Loaded {}", self.path.display());
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[ConfigService] {} not found, using defaults",
                    self.path.display()
                );
                Ok(FocusConfig::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    pub async fn get_config(&self) -> FocusConfig {
        if let Some(cached) = self.cached() {
            return cached;
        }

        let loaded = match self.load().await {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "[ConfigService] Failed to load {}: {}. Using defaults",
                    self.path.display(),
                    err
                );
                FocusConfig::default()
            }
        };

        self.store_cache(Some(loaded.clone()));
        loaded
    }

    /// Writes the configuration and refreshes the cache.
    pub async fn save(&self, config: &FocusConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, config.to_toml_string()?).await?;
        self.store_cache(Some(config.clone()));
        tracing::info!("[ConfigService] Saved {}", self.path.display());
        Ok(())
    }

    /// Writes the defaults if no file exists yet.
    pub async fn ensure_exists(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        self.save(&FocusConfig::default()).await
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        self.store_cache(None);
    }

    fn cached(&self) -> Option<FocusConfig> {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_cache(&self, value: Option<FocusConfig>) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}
