//! Credential sources and the credential_process output format

pub mod output;
pub mod provider;

pub use provider::{AwsCliProvider, CredentialProvider, FetchContext, ProviderCredentials};
