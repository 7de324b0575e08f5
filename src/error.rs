//! Error types for cred-cachier
//!
//! All modules use `CachierResult<T>` as their return type. Every variant is
//! terminal for the process; `main` is the only place that turns one into an
//! exit code.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for cred-cachier operations
pub type CachierResult<T> = Result<T, CachierError>;

/// All errors that can occur in cred-cachier
#[derive(Error, Debug)]
pub enum CachierError {
    // Invocation errors
    #[error("Loop detected! Called recursively by PID: {pid}")]
    LoopDetected { pid: u32 },

    #[error("Failed to compute request fingerprint: {0}")]
    Fingerprint(String),

    // Lock errors
    #[error("Timed out after {waited:?} waiting for cache lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    // Provider errors
    #[error("Credential provider error: {0}")]
    Provider(String),

    #[error("Credential provider returned no credentials")]
    ProviderNotConfigured,

    #[error("Malformed expiration timestamp {value:?}: {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    // Store errors
    #[error("Credential store error: {context}")]
    StoreIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CachierError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store IO error with context
    pub fn store_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StoreIo {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LoopDetected { .. } => {
                Some("The credential provider is configured to call cred-cachier again; point it at the real credential source")
            }
            Self::LockTimeout { .. } => {
                Some("Another cred-cachier process is holding the lock; retry shortly")
            }
            Self::ProviderNotConfigured => Some("Run: aws configure"),
            Self::StoreIo { .. } => Some("Check that ~/.cred-cachier is writable"),
            _ => None,
        }
    }
}
