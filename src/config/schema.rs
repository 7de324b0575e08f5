//! Configuration schema for cred-cachier
//!
//! Configuration is stored at `~/.config/cred-cachier/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Credential store and freshness policy
    pub cache: CacheConfig,

    /// Cross-process lock settings
    pub lock: LockConfig,

    /// External credential provider
    pub provider: ProviderConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Credential cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store root override (default: `~/.cred-cachier`)
    pub dir: Option<PathBuf>,

    /// A record must outlive now + this margin to be served
    pub safety_margin_secs: u64,

    /// Validity assigned to credentials the provider reports no expiry for
    pub default_validity_secs: u64,
}

impl CacheConfig {
    pub fn safety_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.safety_margin_secs as i64)
    }

    pub fn default_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_validity_secs as i64)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            safety_margin_secs: 60,
            default_validity_secs: 300,
        }
    }
}

/// Lock acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Give up waiting for the lock after this many seconds
    pub timeout_secs: u64,

    /// Lower bound of the randomized retry delay
    pub backoff_min_ms: u64,

    /// Upper bound of the randomized retry delay
    pub backoff_max_ms: u64,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            backoff_min_ms: 500,
            backoff_max_ms: 750,
        }
    }
}

/// Credential provider command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Program to execute
    pub command: String,

    /// Arguments; the program must print a credential-process document
    pub args: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: "aws".to_string(),
            args: vec![
                "configure".to_string(),
                "export-credentials".to_string(),
                "--format".to_string(),
                "process".to_string(),
            ],
        }
    }
}
