//! Message reader for length-prefixed QUIC messages
//!
//! Protocol format: [4-byte big-endian length][N-byte payload]

use anyhow::{Context, Result};
use quinn::RecvStream;
use textcast_core::{FrameBuffer, NetworkMessage};

/// Reads whole messages from a QUIC receive stream
pub struct MessageReader {
    recv: RecvStream,
    frames: FrameBuffer,
}

impl MessageReader {
    pub fn new(recv: RecvStream) -> Self {
        Self {
            recv,
            frames: FrameBuffer::new(),
        }
    }

    /// Next complete message, or `None` once the host finishes the stream
    pub async fn read_message(&mut self) -> Result<Option<NetworkMessage>> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(msg) = self.frames.next_message()? {
                return Ok(Some(msg));
            }
            match self.recv.read(&mut buf).await.context("Stream read failed")? {
                Some(n) => self.frames.extend(&buf[..n]),
                None => {
                    if self.frames.buffered() > 0 {
                        tracing::debug!("Stream ended with {} stray bytes", self.frames.buffered());
                    }
                    return Ok(None);
                }
            }
        }
    }
}
