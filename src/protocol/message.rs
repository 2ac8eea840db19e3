//! SSH agent protocol message types and parsing

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// SSH_AGENTC_REQUEST_RSA_IDENTITIES - legacy (protocol 1) identity listing
pub const SSH_AGENTC_REQUEST_RSA_IDENTITIES: u8 = 1;

/// SSH_AGENT_FAILURE - generic failure reply
pub const SSH_AGENT_FAILURE: u8 = 5;

/// SSH2_AGENTC_REQUEST_IDENTITIES - identity listing
pub const SSH2_AGENTC_REQUEST_IDENTITIES: u8 = 11;

/// SSH2_AGENTC_SIGN_REQUEST - signature request
pub const SSH2_AGENTC_SIGN_REQUEST: u8 = 13;

/// Request a signature over the legacy session identifier format
pub const SSH_AGENT_OLD_SIGNATURE: u32 = 1;

/// Request an RSA signature using SHA-256 (RFC 8332)
pub const SSH_AGENT_RSA_SHA2_256: u32 = 2;

/// Request an RSA signature using SHA-512 (RFC 8332)
pub const SSH_AGENT_RSA_SHA2_512: u32 = 4;

/// Message types the proxy recognizes
///
/// Everything the filter does not need to understand maps to `Unrecognized`;
/// the raw code byte is still carried by [`AgentMessage`] so that forwarding
/// stays byte-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Legacy protocol-1 identity listing (code 1)
    RequestRsaIdentities,
    /// Identity listing (code 11)
    RequestIdentities,
    /// Signature request (code 13)
    SignRequest,
    /// Failure reply (code 5)
    Failure,
    /// Any other code
    Unrecognized,
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            SSH_AGENTC_REQUEST_RSA_IDENTITIES => MessageType::RequestRsaIdentities,
            SSH2_AGENTC_REQUEST_IDENTITIES => MessageType::RequestIdentities,
            SSH2_AGENTC_SIGN_REQUEST => MessageType::SignRequest,
            SSH_AGENT_FAILURE => MessageType::Failure,
            _ => MessageType::Unrecognized,
        }
    }
}

impl MessageType {
    /// Get the message type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::RequestRsaIdentities => "SSH_AGENTC_REQUEST_RSA_IDENTITIES",
            MessageType::RequestIdentities => "SSH2_AGENTC_REQUEST_IDENTITIES",
            MessageType::SignRequest => "SSH2_AGENTC_SIGN_REQUEST",
            MessageType::Failure => "SSH_AGENT_FAILURE",
            MessageType::Unrecognized => "UNRECOGNIZED",
        }
    }
}

/// A framed SSH agent protocol message
///
/// The on-wire frame is a 4-byte big-endian length, one code byte, and
/// `length - 1` payload bytes. The original code byte is preserved even for
/// unrecognized messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    /// Raw message code byte
    pub code: u8,
    /// Raw message payload (excluding the code byte)
    pub payload: Bytes,
}

impl AgentMessage {
    /// Create a new message
    pub fn new(code: u8, payload: Bytes) -> Self {
        Self { code, payload }
    }

    /// Create the synthesized failure reply (code 5, empty payload)
    pub fn failure() -> Self {
        Self {
            code: SSH_AGENT_FAILURE,
            payload: Bytes::new(),
        }
    }

    /// Classify the message code
    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.code)
    }

    /// Encode the message to bytes (including the length prefix)
    pub fn encode(&self) -> Bytes {
        let total_len = 1 + self.payload.len();
        let mut buf = BytesMut::with_capacity(4 + total_len);
        buf.put_u32(total_len as u32);
        buf.put_u8(self.code);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a message from bytes (excluding the length prefix)
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidMessage("empty message".to_string()));
        }

        Ok(Self {
            code: data[0],
            payload: Bytes::copy_from_slice(&data[1..]),
        })
    }
}

/// Decoded body of a sign request
///
/// The body is two length-prefixed fields (key blob, then the data to sign)
/// followed by a 32-bit big-endian flags word, with nothing after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    /// Raw SSH public-key blob identifying the signing key
    pub key_blob: Bytes,
    /// Payload to be signed
    pub data: Bytes,
    /// Signature flags
    pub flags: u32,
}

impl SignRequest {
    /// Decode a sign-request body
    ///
    /// Fails with an invalid-message error when a field length exceeds the
    /// remaining body or bytes remain after the flags word, and with a
    /// bad-flags error when the flags value is not one of the recognized
    /// signature flags.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut buf = body;

        let key_blob = read_string(&mut buf)?;
        let data = read_string(&mut buf)?;

        if buf.remaining() < 4 {
            return Err(Error::InvalidMessage(
                "sign request truncated before flags".to_string(),
            ));
        }
        let flags = buf.get_u32();

        if buf.has_remaining() {
            return Err(Error::InvalidMessage(format!(
                "{} trailing bytes after sign request flags",
                buf.remaining()
            )));
        }

        match flags {
            0 | SSH_AGENT_OLD_SIGNATURE | SSH_AGENT_RSA_SHA2_256 | SSH_AGENT_RSA_SHA2_512 => {}
            other => return Err(Error::BadFlags(other)),
        }

        Ok(Self {
            key_blob,
            data,
            flags,
        })
    }
}

/// Read one length-prefixed field (`u32 length || length bytes`)
fn read_string(buf: &mut &[u8]) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(Error::InvalidMessage("message too short".to_string()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(Error::InvalidMessage(format!(
            "field length {} exceeds remaining {} bytes",
            len,
            buf.remaining()
        )));
    }
    let field = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(field)
}
