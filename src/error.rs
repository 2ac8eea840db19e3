//! Error types for keyholder-proxy

use thiserror::Error;

/// Main error type for keyholder-proxy
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unsupported sign request flags: {0:#x}")]
    BadFlags(u32),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Policy file error: {0}")]
    PolicyFile(#[from] serde_yaml::Error),

    #[error("Peer credentials error: {0}")]
    PeerCredentials(String),

    #[error("Upstream agent not available: {0}")]
    UpstreamNotAvailable(String),

    #[error("Socket error: {0}")]
    Socket(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
