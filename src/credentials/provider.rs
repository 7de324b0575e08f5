//! External credential provider
//!
//! The provider is whatever actually talks to the cloud. cred-cachier only
//! runs it as a subprocess and reads a credential-process document back.

use crate::config::schema::ProviderConfig;
use crate::error::{CachierError, CachierResult};
use crate::guard::{RecursionToken, TOKEN_VAR};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Freshly fetched credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the provider considers these credentials temporary
    pub can_expire: bool,
}

/// Everything a provider needs to know about the invocation
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Ignore profiles and shared config/credentials files
    pub disable_shared_config: bool,

    /// Must be visible to anything the provider spawns
    pub token: RecursionToken,
}

/// Source of fresh credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self, ctx: &FetchContext) -> CachierResult<ProviderCredentials>;
}

/// Provider backed by the AWS CLI (or any command emitting the same document)
pub struct AwsCliProvider {
    command: String,
    args: Vec<String>,
}

impl AwsCliProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CredentialProvider for AwsCliProvider {
    async fn fetch(&self, ctx: &FetchContext) -> CachierResult<ProviderCredentials> {
        let command_line = self.display_command();
        debug!("Requesting credentials via: {}", command_line);

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd.env(TOKEN_VAR, ctx.token.encode());

        if ctx.disable_shared_config {
            debug!("Shared config disabled, forcing environment/metadata resolution");
            cmd.env("AWS_CONFIG_FILE", NULL_DEVICE);
            cmd.env("AWS_SHARED_CREDENTIALS_FILE", NULL_DEVICE);
            cmd.env_remove("AWS_PROFILE");
            cmd.env_remove("AWS_DEFAULT_PROFILE");
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| CachierError::command_failed(&command_line, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Unable to locate credentials") {
                return Err(CachierError::ProviderNotConfigured);
            }
            return Err(CachierError::Provider(format!(
                "{} exited with {}: {}",
                command_line,
                output.status,
                stderr.trim()
            )));
        }

        parse_process_output(&output.stdout)
    }
}

#[derive(Deserialize)]
struct ProcessDocument {
    #[serde(rename = "Version")]
    version: u32,
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "SessionToken", default)]
    session_token: Option<String>,
    #[serde(rename = "Expiration", default)]
    expiration: Option<String>,
}

/// Parse a credential-process document
pub fn parse_process_output(stdout: &[u8]) -> CachierResult<ProviderCredentials> {
    let doc: ProcessDocument = serde_json::from_slice(stdout)
        .map_err(|e| CachierError::Provider(format!("Failed to parse response: {}", e)))?;

    if doc.version != 1 {
        return Err(CachierError::Provider(format!(
            "unsupported credential document version {}",
            doc.version
        )));
    }

    if doc.access_key_id.is_empty() || doc.secret_access_key.is_empty() {
        return Err(CachierError::ProviderNotConfigured);
    }

    let expires_at = match doc.expiration.filter(|s| !s.is_empty()) {
        Some(value) => {
            let parsed = DateTime::parse_from_rfc3339(&value)
                .map_err(|source| CachierError::MalformedTimestamp { value, source })?;
            Some(parsed.with_timezone(&Utc))
        }
        None => None,
    };

    Ok(ProviderCredentials {
        access_key_id: doc.access_key_id,
        secret_access_key: doc.secret_access_key,
        session_token: doc.session_token.filter(|s| !s.is_empty()),
        can_expire: expires_at.is_some(),
        expires_at,
    })
}
