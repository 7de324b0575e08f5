//! cred-cachier - Cross-process credential cache
//!
//! Sits in front of an expensive temporary-credential provider and serves
//! the last fetched credential while it is still valid. Concurrent
//! invocations coordinate through a lock file so only one of them refreshes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod fingerprint;
pub mod guard;

pub use error::{CachierError, CachierResult};
