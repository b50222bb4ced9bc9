//! Global configuration for reqrender.
//!
//! Settings live in a TOML file. The location is, in order of preference:
//! 1. the `--config` command-line flag
//! 2. the `REQRENDER_CONFIG` environment variable
//! 3. `~/.reqrender/config.toml` (`%LOCALAPPDATA%\reqrender\config.toml` on Windows)
//!
//! A missing file is not an error; every setting has a default.
//!
//! ```toml
//! # How long a built render context stays cached, in milliseconds
//! eviction_delay_ms = 5000
//!
//! # Set to false to pass template values through untouched
//! templating_enabled = true
//!
//! # Document store used when --store is not given
//! store_dir = "/home/me/api-workspace"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::templating::DEFAULT_EVICTION_DELAY;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "REQRENDER_CONFIG";

/// User-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Cache residency of a populated render context, in milliseconds
    pub eviction_delay_ms: u64,
    /// Whether templates are rendered at all
    pub templating_enabled: bool,
    /// Default document store directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            eviction_delay_ms: DEFAULT_EVICTION_DELAY.as_millis() as u64,
            templating_enabled: true,
            store_dir: None,
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, falling back to defaults if the file is absent.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, else from `REQRENDER_CONFIG` or the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => match std::env::var_os(CONFIG_ENV_VAR) {
                Some(path) => PathBuf::from(path),
                None => Self::default_path()?,
            },
        };

        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Platform-specific default config path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("reqrender")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".reqrender")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn eviction_delay(&self) -> Duration {
        Duration::from_millis(self.eviction_delay_ms)
    }
}
