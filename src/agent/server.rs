//! Unix socket listener for the proxy
//!
//! Binds the proxy socket and accepts client connections sequentially, each
//! running its session on its own task. Per-connection failures never stop
//! the accept loop.

use crate::agent::{Session, Upstream};
use crate::auth::{PeerIdentity, Policy};
use crate::error::{Error, Result};
use crate::logging::audit::{AuditEvent, AuditEventKind, AuditWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Listening socket serving filtered agent sessions
pub struct Server {
    socket_path: PathBuf,
    upstream: Upstream,
    policy: Arc<Policy>,
    audit: Option<Arc<AuditWriter>>,
    listener: Option<UnixListener>,
}

impl Server {
    /// Create a server that will listen on `socket_path` and proxy to
    /// `upstream`
    pub fn new<P: AsRef<Path>>(socket_path: P, upstream: Upstream, policy: Arc<Policy>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            upstream,
            policy,
            audit: None,
            listener: None,
        }
    }

    /// Set the audit writer shared with every session
    pub fn with_audit(mut self, audit: Arc<AuditWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the listening socket
    ///
    /// A stale socket file left by a previous run is removed first; a
    /// symlink at the path is refused. The parent directory is created if
    /// missing. Bind failure is a fatal startup error.
    pub fn bind(&mut self) -> Result<()> {
        match std::fs::symlink_metadata(&self.socket_path) {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() {
                    return Err(Error::Socket(format!(
                        "refusing to replace symlink at {}",
                        self.socket_path.display()
                    )));
                }
                debug!(path = %self.socket_path.display(), "removing stale socket file");
                std::fs::remove_file(&self.socket_path).map_err(|e| {
                    Error::Socket(format!(
                        "failed to remove stale socket at {}: {}",
                        self.socket_path.display(),
                        e
                    ))
                })?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Socket(format!(
                    "failed to check socket path {}: {}",
                    self.socket_path.display(),
                    e
                )));
            }
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Socket(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            Error::Socket(format!(
                "failed to bind to socket at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;

        info!(path = %self.socket_path.display(), "proxy listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Accept connections forever, spawning one session task each
    pub async fn run(&self) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| Error::Socket("server is not bound".to_string()))?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let upstream = self.upstream.clone();
                    let policy = Arc::clone(&self.policy);
                    let audit = self.audit.clone();
                    tokio::spawn(handle_connection(stream, upstream, policy, audit));
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    fn cleanup(&self) {
        if self.listener.is_some() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %self.socket_path.display(),
                        error = %e,
                        "failed to remove socket file during cleanup"
                    );
                }
            } else {
                debug!(path = %self.socket_path.display(), "removed socket file");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Run one accepted connection to completion
async fn handle_connection(
    client: UnixStream,
    upstream: Upstream,
    policy: Arc<Policy>,
    audit: Option<Arc<AuditWriter>>,
) {
    // Fail closed: no identity, no session
    let peer = match PeerIdentity::from_stream(&client) {
        Ok(peer) => peer,
        Err(e) => {
            warn!(error = %e, "closing connection without peer identity");
            return;
        }
    };

    debug!(user = %peer.user, "accepted client connection");

    let agent = match upstream.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(user = %peer.user, error = %e, "closing client, upstream unavailable");
            return;
        }
    };

    if let Some(ref audit) = audit {
        let event = AuditEvent::new(AuditEventKind::ClientConnect).with_user(&peer.user);
        if let Err(e) = audit.write(&event) {
            warn!(error = %e, "failed to write audit event");
        }
    }

    let user = peer.user.clone();
    let mut session = Session::new(client, agent, peer, policy);
    if let Some(ref audit) = audit {
        session = session.with_audit(Arc::clone(audit));
    }

    if let Err(e) = session.run().await {
        warn!(user = %user, error = %e, "session terminated");
    }

    if let Some(ref audit) = audit {
        let event = AuditEvent::new(AuditEventKind::ClientDisconnect).with_user(&user);
        if let Err(e) = audit.write(&event) {
            warn!(error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_server(path: &Path) -> Server {
        Server::new(
            path,
            Upstream::new("/tmp/agent-does-not-exist.sock"),
            Arc::new(Policy::default()),
        )
    }

    #[tokio::test]
    async fn test_bind_and_cleanup() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("proxy.sock");

        {
            let mut server = test_server(&socket_path);
            server.bind().unwrap();
            assert!(socket_path.exists());
        }

        // After drop, the socket file is gone
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_bind_removes_stale_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("proxy.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let mut server = test_server(&socket_path);
        server.bind().unwrap();
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_bind_refuses_symlink() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("proxy.sock");
        std::fs::write(&target, b"target").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let mut server = test_server(&link);
        let result = server.bind();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("symlink"));
        // The link itself is untouched
        assert!(link.symlink_metadata().is_ok());
    }

    #[tokio::test]
    async fn test_bind_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("nested").join("proxy.sock");

        let mut server = test_server(&socket_path);
        server.bind().unwrap();
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_run_unbound_fails() {
        let dir = tempdir().unwrap();
        let server = test_server(&dir.path().join("proxy.sock"));
        let result = server.run().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not bound"));
    }
}
