//! Request filtering
//!
//! The single decision point for client-originated messages. Identity
//! listings pass through, signature requests pass only when the peer's
//! groups intersect the policy entry for the presented key, and everything
//! else is rejected. Every ambiguous case lands on reject.

use crate::auth::fingerprint::{md5_fingerprint, sha256_fingerprint};
use crate::auth::{PeerIdentity, Policy};
use crate::error::Error;
use crate::protocol::{AgentMessage, MessageType, SignRequest};

/// Outcome of filtering one client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward the original frame to the agent unmodified
    Forward,
    /// Answer the client with a failure frame; forward nothing
    Reject(RejectReason),
}

/// Why a client message was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A list-identities request carried a non-empty body
    TrailingBytes,
    /// A sign-request body did not parse
    MalformedSignRequest,
    /// A sign request carried an unrecognized flags value
    BadFlags,
    /// No group of the peer is authorized for the presented key
    KeyNotAuthorized,
    /// The message code is not one the proxy serves
    UnrecognizedRequest,
}

impl RejectReason {
    /// Short description for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TrailingBytes => "trailing bytes on list request",
            RejectReason::MalformedSignRequest => "malformed sign request",
            RejectReason::BadFlags => "unsupported sign request flags",
            RejectReason::KeyNotAuthorized => "key not authorized for peer groups",
            RejectReason::UnrecognizedRequest => "unrecognized request code",
        }
    }
}

/// Decide what to do with one client-originated message
pub fn evaluate(message: &AgentMessage, peer: &PeerIdentity, policy: &Policy) -> Decision {
    match message.message_type() {
        MessageType::RequestRsaIdentities | MessageType::RequestIdentities => {
            if message.payload.is_empty() {
                Decision::Forward
            } else {
                Decision::Reject(RejectReason::TrailingBytes)
            }
        }
        MessageType::SignRequest => match SignRequest::decode(&message.payload) {
            Ok(request) => {
                let md5 = md5_fingerprint(&request.key_blob);
                let sha256 = sha256_fingerprint(&request.key_blob);
                if policy.authorizes([md5.as_str(), sha256.as_str()], &peer.groups) {
                    Decision::Forward
                } else {
                    Decision::Reject(RejectReason::KeyNotAuthorized)
                }
            }
            Err(Error::BadFlags(_)) => Decision::Reject(RejectReason::BadFlags),
            Err(_) => Decision::Reject(RejectReason::MalformedSignRequest),
        },
        MessageType::Failure | MessageType::Unrecognized => {
            Decision::Reject(RejectReason::UnrecognizedRequest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{
        SSH2_AGENTC_REQUEST_IDENTITIES, SSH2_AGENTC_SIGN_REQUEST,
        SSH_AGENTC_REQUEST_RSA_IDENTITIES, SSH_AGENT_RSA_SHA2_256,
    };
    use bytes::{BufMut, Bytes, BytesMut};
    use std::collections::HashSet;

    const KEY_BLOB: &[u8] = b"fake ssh key blob";

    fn peer(groups: &[&str]) -> PeerIdentity {
        PeerIdentity {
            user: "deploy".to_string(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn policy_for(blob: &[u8], groups: &[&str]) -> Policy {
        let set: HashSet<String> = groups.iter().map(|s| s.to_string()).collect();
        Policy::from_entries([
            (md5_fingerprint(blob), set.clone()),
            (sha256_fingerprint(blob), set),
        ])
    }

    fn sign_message(blob: &[u8], flags: u32) -> AgentMessage {
        let mut body = BytesMut::new();
        body.put_u32(blob.len() as u32);
        body.put_slice(blob);
        body.put_u32(4);
        body.put_slice(b"data");
        body.put_u32(flags);
        AgentMessage::new(SSH2_AGENTC_SIGN_REQUEST, body.freeze())
    }

    #[test]
    fn test_list_identities_forwarded() {
        let policy = Policy::default();
        for code in [
            SSH_AGENTC_REQUEST_RSA_IDENTITIES,
            SSH2_AGENTC_REQUEST_IDENTITIES,
        ] {
            let msg = AgentMessage::new(code, Bytes::new());
            assert_eq!(
                evaluate(&msg, &peer(&["users"]), &policy),
                Decision::Forward
            );
        }
    }

    #[test]
    fn test_list_identities_with_trailing_byte_rejected() {
        let policy = Policy::default();
        let msg = AgentMessage::new(SSH2_AGENTC_REQUEST_IDENTITIES, Bytes::from_static(&[0]));
        assert_eq!(
            evaluate(&msg, &peer(&["users"]), &policy),
            Decision::Reject(RejectReason::TrailingBytes)
        );
    }

    #[test]
    fn test_sign_authorized_group_forwarded() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let msg = sign_message(KEY_BLOB, 0);
        assert_eq!(evaluate(&msg, &peer(&["admins"]), &policy), Decision::Forward);
    }

    #[test]
    fn test_sign_authorized_by_any_intersecting_group() {
        let policy = policy_for(KEY_BLOB, &["admins", "deployers"]);
        let msg = sign_message(KEY_BLOB, SSH_AGENT_RSA_SHA2_256);
        assert_eq!(
            evaluate(&msg, &peer(&["users", "deployers"]), &policy),
            Decision::Forward
        );
    }

    #[test]
    fn test_sign_unauthorized_group_rejected() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let msg = sign_message(KEY_BLOB, 0);
        assert_eq!(
            evaluate(&msg, &peer(&["users"]), &policy),
            Decision::Reject(RejectReason::KeyNotAuthorized)
        );
    }

    #[test]
    fn test_sign_unknown_key_rejected() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let msg = sign_message(b"some other key", 0);
        assert_eq!(
            evaluate(&msg, &peer(&["admins"]), &policy),
            Decision::Reject(RejectReason::KeyNotAuthorized)
        );
    }

    #[test]
    fn test_sign_matches_md5_only_policy_entry() {
        // An entry stored under just one fingerprint form still matches
        let set: HashSet<String> = ["admins".to_string()].into();
        let policy = Policy::from_entries([(md5_fingerprint(KEY_BLOB), set)]);
        let msg = sign_message(KEY_BLOB, 0);
        assert_eq!(evaluate(&msg, &peer(&["admins"]), &policy), Decision::Forward);
    }

    #[test]
    fn test_sign_bad_flags_rejected() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let msg = sign_message(KEY_BLOB, 8);
        assert_eq!(
            evaluate(&msg, &peer(&["admins"]), &policy),
            Decision::Reject(RejectReason::BadFlags)
        );
    }

    #[test]
    fn test_sign_malformed_body_rejected() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let msg = AgentMessage::new(SSH2_AGENTC_SIGN_REQUEST, Bytes::from_static(&[0, 0]));
        assert_eq!(
            evaluate(&msg, &peer(&["admins"]), &policy),
            Decision::Reject(RejectReason::MalformedSignRequest)
        );
    }

    #[test]
    fn test_sign_trailing_byte_rejected() {
        let policy = policy_for(KEY_BLOB, &["admins"]);
        let base = sign_message(KEY_BLOB, 0);
        let mut body = BytesMut::from(&base.payload[..]);
        body.put_u8(0);
        let msg = AgentMessage::new(SSH2_AGENTC_SIGN_REQUEST, body.freeze());
        assert_eq!(
            evaluate(&msg, &peer(&["admins"]), &policy),
            Decision::Reject(RejectReason::MalformedSignRequest)
        );
    }

    #[test]
    fn test_unrecognized_code_rejected() {
        let policy = Policy::default();
        for code in [0u8, 5, 17, 99, 255] {
            let msg = AgentMessage::new(code, Bytes::new());
            assert_eq!(
                evaluate(&msg, &peer(&["admins"]), &policy),
                Decision::Reject(RejectReason::UnrecognizedRequest),
                "code {} should be rejected",
                code
            );
        }
    }
}
