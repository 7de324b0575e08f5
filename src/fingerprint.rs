//! Request fingerprinting
//!
//! A fingerprint identifies one semantic credential request: the arguments
//! this process was invoked with plus every provider environment variable,
//! in the order the environment exposes them. Same request = same cache key.

use crate::error::{CachierError, CachierResult};
use sha2::{Digest, Sha256};
use std::fmt;

/// Environment variables with this (case-sensitive) prefix belong to the request
pub const ENV_PREFIX: &str = "AWS";

/// Deterministic cache key derived from argv and the provider environment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an explicit request.
    ///
    /// `env` is filtered to entries whose key starts with [`ENV_PREFIX`];
    /// its order is significant and is not sorted.
    pub fn compute<K, V>(args: &[String], env: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for arg in args {
            hasher.update(arg.as_bytes());
            hasher.update([0u8]);
        }
        for (key, value) in env {
            let (key, value) = (key.as_ref(), value.as_ref());
            if !key.starts_with(ENV_PREFIX) {
                continue;
            }
            hasher.update(format!("{}={}", key, value).as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();

        // First 16 bytes (32 hex chars) are plenty for accidental collisions
        Self(hex::encode(&digest[..16]))
    }

    /// Fingerprint the current process's own argv and environment
    pub fn from_process() -> CachierResult<Self> {
        let args = std::env::args_os()
            .skip(1)
            .map(|arg| {
                arg.into_string().map_err(|raw| {
                    CachierError::Fingerprint(format!("argument is not valid UTF-8: {:?}", raw))
                })
            })
            .collect::<CachierResult<Vec<_>>>()?;

        let mut env = Vec::new();
        for (key, value) in std::env::vars_os() {
            let Some(key) = key.to_str() else { continue };
            if !key.starts_with(ENV_PREFIX) {
                continue;
            }
            let value = value.into_string().map_err(|_| {
                CachierError::Fingerprint(format!("value of {} is not valid UTF-8", key))
            })?;
            env.push((key.to_string(), value));
        }

        Ok(Self::compute(&args, &env))
    }

    /// Wrap an already computed fingerprint
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
