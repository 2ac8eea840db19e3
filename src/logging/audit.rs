//! JSONL audit log for proxy decisions
//!
//! Each authorization-relevant event is appended as a single JSON object on
//! one line. The writer is safe to share across concurrent sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Audit event kinds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Proxy started serving
    ServerStart,
    /// Proxy stopped
    ServerStop,
    /// Client connected
    ClientConnect,
    /// Client disconnected
    ClientDisconnect,
    /// Client request forwarded to the agent
    RequestForwarded,
    /// Client request answered with a failure frame
    RequestRejected,
    /// Policy index loaded
    PolicyLoad,
    /// Session ended abnormally
    SessionError,
}

/// Decision result for a client request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Request was forwarded to the agent
    Forwarded,
    /// Request was answered with a failure frame
    Rejected,
}

/// A structured audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Timestamp of the event
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Kind of event
    pub kind: AuditEventKind,

    /// Peer user name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Message code of the triggering request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,

    /// MD5-form fingerprint of the key named in a sign request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Decision taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,

    /// Reason for a rejection or error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new event of the given kind, stamped now
    pub fn new(kind: AuditEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            user: None,
            code: None,
            fingerprint: None,
            decision: None,
            reason: None,
        }
    }

    /// Set the peer user name
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the request message code
    pub fn with_code(mut self, code: u8) -> Self {
        self.code = Some(code);
        self
    }

    /// Set the key fingerprint
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the decision
    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Append-only JSONL writer, safe under concurrent use
#[derive(Debug)]
pub struct AuditWriter {
    file: Mutex<BufWriter<File>>,
}

impl AuditWriter {
    /// Open (or create) the audit file in append mode
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one event as a JSON line and flush
    pub fn write(&self, event: &AuditEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", line)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = AuditEvent::new(AuditEventKind::ClientConnect).with_user("deploy");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"client_connect\""));
        assert!(json.contains("\"deploy\""));
        assert!(!json.contains("fingerprint"));
        assert!(!json.contains("decision"));
    }

    #[test]
    fn test_writer_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let writer = AuditWriter::new(&path).unwrap();

        writer
            .write(&AuditEvent::new(AuditEventKind::ServerStart))
            .unwrap();
        writer
            .write(
                &AuditEvent::new(AuditEventKind::RequestRejected)
                    .with_user("deploy")
                    .with_code(13)
                    .with_decision(Decision::Rejected)
                    .with_reason("key not authorized"),
            )
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, AuditEventKind::RequestRejected);
        assert_eq!(second.code, Some(13));
        assert_eq!(second.decision, Some(Decision::Rejected));
    }
}
