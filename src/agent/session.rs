//! Per-connection proxy session
//!
//! A session owns the accepted client socket and a dedicated upstream agent
//! socket, and shuttles framed messages between them until either side
//! closes or a fatal error occurs. Agent frames pass to the client verbatim;
//! client frames go through the filter first, and rejected ones are answered
//! with a failure frame without touching the agent.

use crate::agent::filter::{self, Decision};
use crate::auth::fingerprint::md5_fingerprint;
use crate::auth::{PeerIdentity, Policy};
use crate::error::Result;
use crate::logging::audit::{self, AuditEvent, AuditEventKind, AuditWriter};
use crate::protocol::{AgentFrameCodec, AgentMessage, MessageType, SignRequest};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// One client connection's proxy session
pub struct Session {
    client: Framed<UnixStream, AgentFrameCodec>,
    agent: Framed<UnixStream, AgentFrameCodec>,
    peer: PeerIdentity,
    policy: Arc<Policy>,
    audit: Option<Arc<AuditWriter>>,
}

impl Session {
    /// Create a session over an accepted client stream and a freshly
    /// connected agent stream
    pub fn new(
        client: UnixStream,
        agent: UnixStream,
        peer: PeerIdentity,
        policy: Arc<Policy>,
    ) -> Self {
        Self {
            client: Framed::new(client, AgentFrameCodec),
            agent: Framed::new(agent, AgentFrameCodec),
            peer,
            policy,
            audit: None,
        }
    }

    /// Set the audit writer
    pub fn with_audit(mut self, audit: Arc<AuditWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Get the resolved peer identity
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    fn log(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            if let Err(e) = audit.write(&event) {
                warn!(error = %e, "failed to write audit event");
            }
        }
    }

    /// Shuttle frames in both directions until the session ends
    ///
    /// Returns `Ok(())` on a clean close from either side; framing and I/O
    /// errors terminate the session and are returned to the caller. Both
    /// sockets are released on every exit path.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                frame = self.client.next() => match frame {
                    None => {
                        debug!(user = %self.peer.user, "client closed connection");
                        break;
                    }
                    Some(Err(e)) => return Err(e),
                    Some(Ok(msg)) => self.handle_client_message(msg).await?,
                },
                frame = self.agent.next() => match frame {
                    None => {
                        debug!(user = %self.peer.user, "agent closed connection");
                        break;
                    }
                    Some(Err(e)) => return Err(e),
                    Some(Ok(msg)) => {
                        trace!(user = %self.peer.user, code = msg.code, "relaying agent reply");
                        self.client.send(msg).await?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Apply the filter to one client message and forward or reject it
    async fn handle_client_message(&mut self, msg: AgentMessage) -> Result<()> {
        let fingerprint = (msg.message_type() == MessageType::SignRequest)
            .then(|| SignRequest::decode(&msg.payload).ok())
            .flatten()
            .map(|request| md5_fingerprint(&request.key_blob));

        match filter::evaluate(&msg, &self.peer, &self.policy) {
            Decision::Forward => {
                trace!(
                    user = %self.peer.user,
                    code = msg.code,
                    "forwarding client request to agent"
                );
                let mut event = AuditEvent::new(AuditEventKind::RequestForwarded)
                    .with_user(&self.peer.user)
                    .with_code(msg.code)
                    .with_decision(audit::Decision::Forwarded);
                if let Some(fp) = fingerprint {
                    event = event.with_fingerprint(fp);
                }
                self.log(event);

                self.agent.send(msg).await
            }
            Decision::Reject(reason) => {
                debug!(
                    user = %self.peer.user,
                    code = msg.code,
                    reason = reason.as_str(),
                    "rejecting client request"
                );
                let mut event = AuditEvent::new(AuditEventKind::RequestRejected)
                    .with_user(&self.peer.user)
                    .with_code(msg.code)
                    .with_decision(audit::Decision::Rejected)
                    .with_reason(reason.as_str());
                if let Some(fp) = fingerprint {
                    event = event.with_fingerprint(fp);
                }
                self.log(event);

                self.client.send(AgentMessage::failure()).await
            }
        }
    }
}
