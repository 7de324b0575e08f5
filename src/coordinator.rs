//! Cache coordinator
//!
//! Decides whether a cached record can be served or a fresh credential
//! must be fetched:
//!
//! ```text
//! loop check -> fast read --fresh--> done
//!                   |
//!                 stale -> lock -> re-read --fresh--> done
//!                                     |
//!                                   stale -> fetch -> write -> done
//! ```
//!
//! The fast read takes no lock. Only the refresh path is serialized, and it
//! re-reads after acquiring the lock in case another process refreshed the
//! record while this one waited.
//!
//! A nested invocation (one spawned by another invocation's provider) never
//! takes the lock: its ancestor already holds it, so waiting would only end
//! in a timeout.

use crate::cache::{CachedCredential, CredentialStore, LockCoordinator};
use crate::config::schema::CacheConfig;
use crate::credentials::{CredentialProvider, FetchContext};
use crate::error::{CachierError, CachierResult};
use crate::fingerprint::Fingerprint;
use crate::guard::{LoopGuard, RecursionToken};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the returned credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Fresh record found without locking
    Hit,
    /// Another process refreshed the record while we waited for the lock
    HitAfterWait,
    /// Fetched from the provider and written to the store
    Refreshed,
}

/// A single credential request
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub fingerprint: Fingerprint,

    /// Recursion token inherited from the parent process, if any
    pub inherited_token: Option<String>,

    pub disable_shared_config: bool,
}

/// Result of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolved {
    pub credential: CachedCredential,
    pub outcome: CacheOutcome,
}

/// Composes store, lock and provider into the end-to-end flow
pub struct CacheCoordinator {
    store: CredentialStore,
    lock: LockCoordinator,
    provider: Arc<dyn CredentialProvider>,
    safety_margin: Duration,
    default_validity: Duration,
}

impl CacheCoordinator {
    pub fn new(
        store: CredentialStore,
        lock: LockCoordinator,
        provider: Arc<dyn CredentialProvider>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            lock,
            provider,
            safety_margin: config.safety_margin(),
            default_validity: config.default_validity(),
        }
    }

    /// Resolve a credential for `request`
    pub async fn resolve(&self, request: &CredentialRequest) -> CachierResult<Resolved> {
        let fingerprint = &request.fingerprint;
        let token = LoopGuard::check(request.inherited_token.as_deref(), fingerprint)?;

        if let Some(credential) = self.read_fresh(fingerprint).await {
            debug!("Cache hit for {}", fingerprint);
            return Ok(Resolved {
                credential,
                outcome: CacheOutcome::Hit,
            });
        }

        // An ancestor invocation holds the store lock while its provider runs
        if let Some(parent) = token.parent() {
            return Err(CachierError::LoopDetected { pid: parent.pid });
        }

        debug!("Cache miss for {}, waiting for lock", fingerprint);
        let guard = self.lock.acquire().await?;
        let result = self
            .refresh(fingerprint, token, request.disable_shared_config)
            .await;
        guard.release();

        result
    }

    /// Runs while holding the lock
    async fn refresh(
        &self,
        fingerprint: &Fingerprint,
        token: RecursionToken,
        disable_shared_config: bool,
    ) -> CachierResult<Resolved> {
        if let Some(credential) = self.read_fresh(fingerprint).await {
            debug!("Record {} refreshed by another process", fingerprint);
            return Ok(Resolved {
                credential,
                outcome: CacheOutcome::HitAfterWait,
            });
        }

        let ctx = FetchContext {
            disable_shared_config,
            token,
        };
        let fetched = self.provider.fetch(&ctx).await?;
        let credential = CachedCredential::from_provider(fetched, Utc::now(), self.default_validity);

        self.store.write(fingerprint, &credential).await?;
        info!("Refreshed credential {}", fingerprint);

        Ok(Resolved {
            credential,
            outcome: CacheOutcome::Refreshed,
        })
    }

    async fn read_fresh(&self, fingerprint: &Fingerprint) -> Option<CachedCredential> {
        self.store
            .read(fingerprint)
            .await
            .filter(|cred| cred.is_fresh(self.safety_margin))
    }
}
