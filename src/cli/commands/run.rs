//! Run command - resolve a credential and print it

use crate::cache::{CredentialStore, LockCoordinator};
use crate::cli::Cli;
use crate::config::{Config, ConfigManager};
use crate::coordinator::{CacheCoordinator, CredentialRequest};
use crate::credentials::{output, AwsCliProvider};
use crate::error::{CachierError, CachierResult};
use crate::fingerprint::Fingerprint;
use crate::guard::TOKEN_VAR;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Execute the run command
pub async fn execute(cli: &Cli, config: &Config) -> CachierResult<()> {
    let fingerprint = Fingerprint::from_process()?;
    debug!("Request fingerprint: {}", fingerprint);

    let store = CredentialStore::new(ConfigManager::store_dir(config)?);
    let lock = LockCoordinator::new(store.lock_path(), &config.lock);
    let provider = Arc::new(AwsCliProvider::new(&config.provider));
    let coordinator = CacheCoordinator::new(store, lock, provider, &config.cache);

    let request = CredentialRequest {
        fingerprint,
        inherited_token: std::env::var(TOKEN_VAR).ok(),
        disable_shared_config: cli.disable_shared_config,
    };

    let resolved = coordinator.resolve(&request).await?;
    debug!("Resolved credential ({:?})", resolved.outcome);

    let document = output::format(&resolved.credential)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", document)
        .and_then(|()| stdout.flush())
        .map_err(|e| CachierError::io("writing credential to stdout", e))?;

    Ok(())
}
