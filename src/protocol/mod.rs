//! SSH agent protocol implementation
//!
//! This module implements the subset of the SSH agent protocol the proxy
//! needs: frame encoding/decoding and sign-request parsing, as defined in:
//! https://datatracker.ietf.org/doc/html/draft-miller-ssh-agent

pub mod codec;
pub mod message;

pub use codec::AgentFrameCodec;
pub use message::{AgentMessage, MessageType, SignRequest};
