//! Startup orchestration: load the policy, bind, serve until interrupted

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use crate::agent::{Server, Upstream};
use crate::auth::Policy;
use crate::cli::Cli;
use crate::logging::audit::{AuditEvent, AuditEventKind, AuditWriter};

/// Run the proxy until a shutdown signal arrives
pub async fn execute(cli: Cli) -> Result<()> {
    let policy = Policy::load(&cli.auth_dir, &cli.key_dir).with_context(|| {
        format!(
            "failed to load signing policy from {} and {}",
            cli.auth_dir.display(),
            cli.key_dir.display()
        )
    })?;

    if policy.is_empty() {
        warn!("policy is empty, every sign request will be refused");
    }
    info!(
        auth_dir = %cli.auth_dir.display(),
        key_dir = %cli.key_dir.display(),
        fingerprints = policy.len(),
        "policy loaded"
    );

    let audit = match &cli.log {
        Some(path) => {
            let writer = AuditWriter::new(path)
                .with_context(|| format!("failed to open audit log {}", path.display()))?;
            info!(log = %path.display(), "audit logging enabled");
            Some(Arc::new(writer))
        }
        None => None,
    };

    if let Some(ref audit) = audit {
        audit
            .write(&AuditEvent::new(AuditEventKind::PolicyLoad))
            .context("failed to write audit log")?;
    }

    let upstream = Upstream::new(&cli.connect);
    let mut server = Server::new(&cli.bind, upstream, Arc::new(policy));
    if let Some(ref audit) = audit {
        server = server.with_audit(Arc::clone(audit));
    }

    server
        .bind()
        .with_context(|| format!("failed to bind proxy socket at {}", cli.bind.display()))?;

    if let Some(ref audit) = audit {
        let _ = audit.write(&AuditEvent::new(AuditEventKind::ServerStart));
    }

    info!(
        bind = %cli.bind.display(),
        connect = %cli.connect.display(),
        "proxy started, press Ctrl+C to stop"
    );

    tokio::select! {
        result = server.run() => {
            result.context("listener failed")?;
        }
        _ = signal::ctrl_c() => {
            info!("received shutdown signal, stopping");
        }
    }

    if let Some(ref audit) = audit {
        let _ = audit.write(&AuditEvent::new(AuditEventKind::ServerStop));
    }

    Ok(())
}
