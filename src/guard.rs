//! Recursion loop protection
//!
//! The credential provider may itself be configured to run cred-cachier
//! (credential_process indirection). Each invocation hands its provider a
//! token listing every cred-cachier invocation in the call chain, oldest
//! first. A nested invocation refuses to run when its own fingerprint is
//! already in that chain.
//!
//! A nested invocation for a different request may still be served from the
//! cache, but it can never refresh: its ancestors hold the store lock while
//! their provider runs. The coordinator reports that case through
//! [`RecursionToken::parent`] instead of waiting out the lock timeout.

use crate::error::{CachierError, CachierResult};
use crate::fingerprint::Fingerprint;
use tracing::debug;

/// Reserved variable carrying the token to child processes.
///
/// Must stay outside the provider's `AWS` namespace so it never feeds
/// into the fingerprint.
pub const TOKEN_VAR: &str = "_CRED_CACHIER_TOKEN";

/// One cred-cachier process in the call chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub pid: u32,
    pub fingerprint: Fingerprint,
}

impl Invocation {
    fn parse(value: &str) -> Option<Self> {
        let (pid, fingerprint) = value.split_once(':')?;
        let pid = pid.parse().ok()?;
        if fingerprint.is_empty() {
            return None;
        }
        Some(Self {
            pid,
            fingerprint: Fingerprint::from_hex(fingerprint),
        })
    }
}

/// Call chain of cred-cachier invocations; the last entry is this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursionToken {
    chain: Vec<Invocation>,
}

impl RecursionToken {
    /// Token for a root invocation
    pub fn new(pid: u32, fingerprint: Fingerprint) -> Self {
        Self {
            chain: vec![Invocation { pid, fingerprint }],
        }
    }

    /// Extend an inherited chain with this process
    fn extend(mut ancestors: Vec<Invocation>, fingerprint: Fingerprint) -> Self {
        ancestors.push(Invocation {
            pid: std::process::id(),
            fingerprint,
        });
        Self { chain: ancestors }
    }

    pub fn pid(&self) -> u32 {
        self.current().pid
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.current().fingerprint
    }

    /// Nearest ancestor, if this invocation was started by another one
    pub fn parent(&self) -> Option<&Invocation> {
        self.chain.len().checked_sub(2).map(|i| &self.chain[i])
    }

    fn current(&self) -> &Invocation {
        // chain is never empty: every constructor pushes the current process
        &self.chain[self.chain.len() - 1]
    }

    /// Wire form: `<pid>:<fingerprint>[,<pid>:<fingerprint>...]`
    pub fn encode(&self) -> String {
        self.chain
            .iter()
            .map(|inv| format!("{}:{}", inv.pid, inv.fingerprint))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse the wire form, returning `None` for anything malformed
    pub fn parse(value: &str) -> Option<Self> {
        let chain = value
            .split(',')
            .map(Invocation::parse)
            .collect::<Option<Vec<_>>>()?;
        if chain.is_empty() {
            return None;
        }
        Some(Self { chain })
    }
}

/// Detects self-invocation loops
pub struct LoopGuard;

impl LoopGuard {
    /// Compare the inherited chain against the current fingerprint.
    ///
    /// Returns the token this invocation must propagate to its provider.
    pub fn check(inherited: Option<&str>, fingerprint: &Fingerprint) -> CachierResult<RecursionToken> {
        let ancestors = match inherited.map(RecursionToken::parse) {
            Some(Some(token)) => token.chain,
            Some(None) => {
                debug!("Ignoring malformed {} value", TOKEN_VAR);
                Vec::new()
            }
            None => Vec::new(),
        };

        if let Some(ancestor) = ancestors.iter().find(|a| &a.fingerprint == fingerprint) {
            return Err(CachierError::LoopDetected { pid: ancestor.pid });
        }

        if let Some(parent) = ancestors.last() {
            debug!("Invoked under PID {} for a different request", parent.pid);
        }

        Ok(RecursionToken::extend(ancestors, fingerprint.clone()))
    }
}
