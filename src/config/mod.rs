//! Configuration management for cred-cachier

pub mod schema;

pub use schema::Config;

use crate::error::{CachierError, CachierResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cred-cachier")
            .join("config.toml")
    }

    /// Get the default credential store root (`~/.cred-cachier`)
    pub fn default_store_dir() -> CachierResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".cred-cachier"))
            .ok_or_else(|| CachierError::Internal("unable to resolve home directory".to_string()))
    }

    /// Resolve the store root, honoring a configured override
    pub fn store_dir(config: &Config) -> CachierResult<PathBuf> {
        match &config.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_store_dir(),
        }
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub async fn load(&self) -> CachierResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> CachierResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| CachierError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| CachierError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if config.lock.backoff_min_ms > config.lock.backoff_max_ms {
            return Err(CachierError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: "lock.backoff_min_ms must not exceed lock.backoff_max_ms".to_string(),
            });
        }

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
