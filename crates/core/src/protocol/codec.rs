//! Postcard serialization codec for network messages
//!
//! Frame format: `[4 bytes length (big endian)] [postcard payload]`

use crate::error::{CoreError, Result};
use crate::types::NetworkMessage;
use postcard::{from_bytes, to_allocvec};

/// Maximum message size (16MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Message codec for serialization/deserialization
pub struct MessageCodec;

impl MessageCodec {
    /// Encode network message to a length-prefixed frame
    pub fn encode(msg: &NetworkMessage) -> Result<Vec<u8>> {
        let payload = to_allocvec(msg).map_err(CoreError::from)?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CoreError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let len = payload.len() as u32;
        let mut buf = Vec::with_capacity(LEN_PREFIX + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&payload);

        Ok(buf)
    }

    /// Decode one complete length-prefixed frame
    pub fn decode(buf: &[u8]) -> Result<NetworkMessage> {
        let len = Self::frame_len(buf)?
            .ok_or_else(|| CoreError::InvalidMessageFormat("Buffer too small for length prefix".into()))?;

        if buf.len() < LEN_PREFIX + len {
            return Err(CoreError::InvalidMessageFormat(
                "Buffer too small for payload".into(),
            ));
        }

        Self::decode_payload(&buf[LEN_PREFIX..LEN_PREFIX + len])
    }

    /// Decode a payload whose length prefix was already consumed
    pub fn decode_payload(payload: &[u8]) -> Result<NetworkMessage> {
        from_bytes(payload).map_err(CoreError::from)
    }

    /// Payload length announced by the prefix, `None` if fewer than 4 bytes
    pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
        if buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(CoreError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(Some(len))
    }
}

/// Accumulates stream reads and yields complete messages
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete message, `Ok(None)` if more bytes are needed
    ///
    /// A frame that fails to deserialize is consumed before the error is
    /// returned, so the caller may keep reading after reporting it.
    pub fn next_message(&mut self) -> Result<Option<NetworkMessage>> {
        let Some(len) = MessageCodec::frame_len(&self.buf)? else {
            return Ok(None);
        };
        if self.buf.len() < LEN_PREFIX + len {
            return Ok(None);
        }
        let frame: Vec<u8> = self.buf.drain(..LEN_PREFIX + len).collect();
        MessageCodec::decode_payload(&frame[LEN_PREFIX..]).map(Some)
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SendData, SendTextRequest};

    fn chunk(text: &str) -> NetworkMessage {
        NetworkMessage::SendText(SendTextRequest::default().with_data(&SendData::Text(text.to_string())))
    }

    #[test]
    fn test_encode_decode_send_text() {
        let msg = chunk("echo hello\r");
        let encoded = MessageCodec::encode(&msg).unwrap();
        assert_eq!(MessageCodec::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_frame_buffer_split_reads() {
        let mut stream = MessageCodec::encode(&chunk("first")).unwrap();
        stream.extend(MessageCodec::encode(&NetworkMessage::Close).unwrap());

        let mut frames = FrameBuffer::new();
        frames.extend(&stream[..3]);
        assert!(frames.next_message().unwrap().is_none());
        frames.extend(&stream[3..10]);
        assert!(frames.next_message().unwrap().is_none());
        frames.extend(&stream[10..]);

        assert_eq!(frames.next_message().unwrap(), Some(chunk("first")));
        assert_eq!(frames.next_message().unwrap(), Some(NetworkMessage::Close));
        assert!(frames.next_message().unwrap().is_none());
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn test_frame_buffer_skips_bad_frame() {
        let mut frames = FrameBuffer::new();
        frames.extend(&[0, 0, 0, 2, 0xff, 0xff]);
        frames.extend(&MessageCodec::encode(&NetworkMessage::Close).unwrap());
        assert!(frames.next_message().is_err());
        assert_eq!(frames.next_message().unwrap(), Some(NetworkMessage::Close));
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let result = MessageCodec::frame_len(&u32::MAX.to_be_bytes());
        assert!(matches!(result, Err(CoreError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_invalid_buffer() {
        assert!(MessageCodec::decode(&[1, 2, 3]).is_err());
    }
}
