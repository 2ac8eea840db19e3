//! Command-line interface for keyholder-proxy

pub mod run;

use clap::Parser;
use std::path::PathBuf;

/// Default path of the proxy's listening socket
pub const DEFAULT_BIND: &str = "/run/keyholder/proxy.sock";

/// Default path of the upstream agent socket
pub const DEFAULT_CONNECT: &str = "/run/keyholder/agent.sock";

/// Default directory of policy files
pub const DEFAULT_AUTH_DIR: &str = "/etc/keyholder-auth.d";

/// Default directory of agent public keys
pub const DEFAULT_KEY_DIR: &str = "/etc/keyholder.d";

/// Group-based authorization proxy for an SSH agent socket
#[derive(Parser, Debug, Clone)]
#[command(name = "keyholder-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the UNIX socket the proxy listens on
    #[arg(long, value_name = "ADDRESS", default_value = DEFAULT_BIND)]
    pub bind: PathBuf,

    /// Path of the upstream SSH agent's UNIX socket
    #[arg(long, value_name = "ADDRESS", default_value = DEFAULT_CONNECT)]
    pub connect: PathBuf,

    /// Directory containing policy files (*.yml, *.yaml)
    #[arg(long, value_name = "DIR", default_value = DEFAULT_AUTH_DIR)]
    pub auth_dir: PathBuf,

    /// Directory containing the agent's public keys (*.pub)
    #[arg(long, value_name = "DIR", default_value = DEFAULT_KEY_DIR)]
    pub key_dir: PathBuf,

    /// Path to a JSONL audit log
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
}
