//! Persistent credential cache
//!
//! Records are keyed by request fingerprint and stored one file per key.
//! Refreshes are serialized by a single store-wide lock file.
//!
//! # Layout
//!
//! | Path | Description |
//! |------|-------------|
//! | `~/.cred-cachier/credentials/<fingerprint>.json` | Cached record (0600) |
//! | `~/.cred-cachier/.lock` | Advisory refresh lock |

pub mod lock;
pub mod store;

pub use lock::{LockCoordinator, LockGuard};
pub use store::{CachedCredential, CredentialStore};
