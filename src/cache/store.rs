//! Durable credential store
//!
//! One pretty-printed JSON file per fingerprint under
//! `<root>/credentials/`. Writes are write-temp-then-rename, so a concurrent
//! reader sees either the old record or the new one, never a torn file.

use crate::credentials::ProviderCredentials;
use crate::error::{CachierError, CachierResult};
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Logical collection all records live in
pub const COLLECTION: &str = "credentials";

/// Name of the global lock file inside the store root
pub const LOCK_FILE: &str = ".lock";

/// Cached credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_key_id: String,

    pub secret_access_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Records without an expiry are never fresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedCredential {
    /// Build a record from provider output.
    ///
    /// Credentials that cannot expire, or come without an expiry, are given
    /// `default_validity` from `now` so they get revalidated periodically.
    pub fn from_provider(
        creds: ProviderCredentials,
        now: DateTime<Utc>,
        default_validity: Duration,
    ) -> Self {
        let expires_at = match (creds.can_expire, creds.expires_at) {
            (true, Some(at)) => at,
            _ => now + default_validity,
        };

        Self {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: creds.session_token,
            expires_at: Some(expires_at),
        }
    }

    /// Fresh iff the expiry is strictly later than `now + margin`
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|at| at > now + margin)
    }

    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.is_fresh_at(Utc::now(), margin)
    }
}

/// Credential store rooted at a per-user directory
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Create a store handle. Nothing touches the disk until the first write.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the lock file guarding refreshes
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Read a record. Missing, unreadable and malformed records are all `None`.
    pub async fn read(&self, key: &Fingerprint) -> Option<CachedCredential> {
        let path = self.record_path(key);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Treating unreadable record {} as missing: {}", path.display(), e);
                }
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(cred) => Some(cred),
            Err(e) => {
                debug!("Treating malformed record {} as missing: {}", path.display(), e);
                None
            }
        }
    }

    /// Atomically replace the record for `key`
    pub async fn write(&self, key: &Fingerprint, cred: &CachedCredential) -> CachierResult<()> {
        let dir = self.root.join(COLLECTION);
        self.ensure_root().await?;
        self.ensure_dir(&dir).await?;

        let path = self.record_path(key);
        let temp_path = dir.join(format!(".{}.json.tmp.{}", key, Uuid::new_v4()));
        let content = serde_json::to_string_pretty(cred)?;

        if let Err(e) = Self::write_temp(&temp_path, &content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CachierError::store_io(
                format!("replacing record {}", path.display()),
                e,
            ));
        }

        match cred.expires_at {
            Some(at) => debug!("Cached credential {} until {}", key, at),
            None => debug!("Cached credential {} without expiry", key),
        }
        Ok(())
    }

    /// Create the store root with owner-only permissions
    pub async fn ensure_root(&self) -> CachierResult<()> {
        self.ensure_dir(&self.root).await
    }

    async fn ensure_dir(&self, dir: &Path) -> CachierResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| CachierError::store_io(format!("creating {}", dir.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(dir, perms)
                .await
                .map_err(|e| CachierError::store_io("setting store dir permissions", e))?;
        }

        Ok(())
    }

    async fn write_temp(path: &Path, content: &str) -> CachierResult<()> {
        fs::write(path, content)
            .await
            .map_err(|e| CachierError::store_io(format!("writing {}", path.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)
                .await
                .map_err(|e| CachierError::store_io("setting record permissions", e))?;
        }

        Ok(())
    }

    fn record_path(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(COLLECTION).join(format!("{}.json", key))
    }
}
