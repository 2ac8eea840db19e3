//! keyholder-proxy - group-based authorization proxy for an SSH agent socket
//!
//! This library implements a filtering proxy that sits in front of an SSH
//! agent's UNIX domain socket. Connecting users may list the agent's
//! identities freely, but a signature request is forwarded to the agent only
//! when the requesting user's POSIX group membership is authorized for the
//! presented key's fingerprint.

pub mod agent;
pub mod auth;
pub mod cli;
pub mod error;
pub mod logging;
pub mod protocol;

pub use error::{Error, Result};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const NAME: &str = env!("CARGO_PKG_NAME");
