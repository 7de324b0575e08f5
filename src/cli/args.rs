//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// cred-cachier - Cross-process cache for temporary cloud credentials
///
/// Prints a credential_process document, reusing a cached credential while
/// it is still valid and fetching a fresh one otherwise.
#[derive(Parser, Debug)]
#[command(name = "cred-cachier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Disable shared configuration (force use of EC2/ECS metadata, ignore AWS_PROFILE, etc.)
    #[arg(long)]
    pub disable_shared_config: bool,

    /// Increase verbosity on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "CRED_CACHIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional arguments; they only distinguish one cache entry from another
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
