//! SSH agent wire framing for tokio
//!
//! Implemented as a `tokio_util` codec so that frame reads are buffered and
//! safe to poll from inside `tokio::select!`.

use crate::error::Error;
use crate::protocol::message::AgentMessage;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum message size (16MB, same as OpenSSH)
const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Codec framing SSH agent messages on a byte stream
#[derive(Debug, Default)]
pub struct AgentFrameCodec;

impl Decoder for AgentFrameCodec {
    type Item = AgentMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AgentMessage>, Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if len == 0 {
            return Err(Error::InvalidMessage("zero-length frame".to_string()));
        }
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidMessage(format!(
                "frame too large: {} bytes",
                len
            )));
        }

        let total = 4 + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(4);
        let frame = src.split_to(len as usize);
        AgentMessage::decode(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<AgentMessage>, Error> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            // Fewer than a full 5-byte header at close counts as a clean EOF;
            // anything more is a frame cut short mid-stream.
            None if src.len() < 5 => Ok(None),
            None => Err(Error::InvalidMessage(format!(
                "connection closed mid-frame with {} bytes buffered",
                src.len()
            ))),
        }
    }
}

impl Encoder<AgentMessage> for AgentFrameCodec {
    type Error = Error;

    fn encode(&mut self, msg: AgentMessage, dst: &mut BytesMut) -> Result<(), Error> {
        dst.extend_from_slice(&msg.encode());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::SSH2_AGENTC_REQUEST_IDENTITIES;
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    async fn read_all(data: Vec<u8>) -> Vec<Result<AgentMessage, Error>> {
        let mut framed = FramedRead::new(&data[..], AgentFrameCodec);
        let mut out = Vec::new();
        while let Some(item) = framed.next().await {
            let errored = item.is_err();
            out.push(item);
            if errored {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn test_read_eof() {
        // Empty input is a clean end of stream
        assert!(read_all(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_valid_request_identities() {
        let frames = read_all(vec![0, 0, 0, 1, 11]).await;
        assert_eq!(frames.len(), 1);
        let msg = frames[0].as_ref().unwrap();
        assert_eq!(msg.code, SSH2_AGENTC_REQUEST_IDENTITIES);
        assert!(msg.payload.is_empty());
    }

    #[tokio::test]
    async fn test_read_zero_length_frame() {
        let frames = read_all(vec![0, 0, 0, 0]).await;
        assert_eq!(frames.len(), 1);
        let err = frames[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("zero-length"));
    }

    #[tokio::test]
    async fn test_read_frame_too_large() {
        // 16MB + 1
        let frames = read_all(vec![0x01, 0x00, 0x00, 0x01]).await;
        assert_eq!(frames.len(), 1);
        assert!(
            frames[0]
                .as_ref()
                .unwrap_err()
                .to_string()
                .contains("too large")
        );
    }

    #[tokio::test]
    async fn test_read_truncated_header_is_clean_eof() {
        // A partial header at stream close reads as connection closed
        assert!(read_all(vec![0, 0]).await.is_empty());
        assert!(read_all(vec![0, 0, 0, 10]).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_truncated_body() {
        // Length says 10 bytes but only 5 arrive before close
        let frames = read_all(vec![0, 0, 0, 10, 13, 1, 2, 3, 4]).await;
        assert_eq!(frames.len(), 1);
        assert!(
            frames[0]
                .as_ref()
                .unwrap_err()
                .to_string()
                .contains("mid-frame")
        );
    }

    #[tokio::test]
    async fn test_read_back_to_back_frames() {
        let frames = read_all(vec![0, 0, 0, 1, 11, 0, 0, 0, 3, 13, 0xaa, 0xbb]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap().code, 11);
        let second = frames[1].as_ref().unwrap();
        assert_eq!(second.code, 13);
        assert_eq!(&second.payload[..], &[0xaa, 0xbb]);
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut framed = FramedWrite::new(&mut buf, AgentFrameCodec);
            for code in [0u8, 5, 11, 13, 255] {
                framed
                    .send(AgentMessage::new(code, Bytes::from(vec![code; 7])))
                    .await
                    .unwrap();
            }
        }

        let frames = read_all(buf).await;
        assert_eq!(frames.len(), 5);
        for (frame, code) in frames.iter().zip([0u8, 5, 11, 13, 255]) {
            let msg = frame.as_ref().unwrap();
            assert_eq!(msg.code, code);
            assert_eq!(&msg.payload[..], &vec![code; 7][..]);
        }
    }
}
