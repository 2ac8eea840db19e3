//! Upstream SSH agent connection
//!
//! Each session opens its own dedicated connection to the upstream agent
//! socket; this type holds the path and the connect policy.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::trace;

/// Connection timeout for the upstream agent
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Factory for connections to the upstream SSH agent
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Path to the upstream agent socket
    socket_path: PathBuf,
}

impl Upstream {
    /// Create a new upstream connection factory
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Open a dedicated connection to the upstream agent
    pub async fn connect(&self) -> Result<UnixStream> {
        let attempt = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path));
        let stream = match attempt.await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.unavailable(&e.to_string())),
            Err(_) => {
                return Err(self.unavailable(&format!("no answer within {:?}", CONNECT_TIMEOUT)))
            }
        };

        trace!(socket_path = %self.socket_path.display(), "connected to upstream agent");
        Ok(stream)
    }

    fn unavailable(&self, cause: &str) -> Error {
        Error::UpstreamNotAvailable(format!("{}: {}", self.socket_path.display(), cause))
    }
}
