//! credential_process output document

use crate::cache::CachedCredential;
use crate::error::CachierResult;
use chrono::SecondsFormat;
use serde::Serialize;

/// Protocol version of the credential_process document
const PROCESS_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredential<'a> {
    access_key_id: &'a str,
    secret_access_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>,
    version: u32,
}

/// Render a record as the document printed to stdout
pub fn format(cred: &CachedCredential) -> CachierResult<String> {
    let doc = ProcessCredential {
        access_key_id: &cred.access_key_id,
        secret_access_key: &cred.secret_access_key,
        session_token: cred.session_token.as_deref(),
        expiration: cred
            .expires_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        version: PROCESS_VERSION,
    };

    Ok(serde_json::to_string_pretty(&doc)?)
}
