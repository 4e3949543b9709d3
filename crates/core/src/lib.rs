//! Textcast Core - shared logic for remote send-text
//!
//! This crate provides:
//! - Protocol types (send-text requests, wire data encodings, messages)
//! - The client-side chunk encoder and escape expansion
//! - Postcard framing codec
//! - QUIC transport configuration and certificate pinning
//! - Error types

// Version constants
pub const PROTOCOL_VERSION: u32 = 1;
pub const APP_VERSION_STRING: &str = "0.1.0";

/// Source units (bytes, or characters for literal text) per send-text chunk
pub const CHUNK_LIMIT: usize = 1024;

pub mod auth;
pub mod chunker;
pub mod error;
pub mod escape;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export common types
pub use auth::AuthToken;
pub use chunker::{ChunkEncoder, StreamMode};
pub use error::{CoreError, Result};
pub use protocol::{FrameBuffer, MessageCodec};
pub use types::{ConnectInfo, NetworkMessage, SendData, SendTextRequest, SessionControl};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants_defined() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(CHUNK_LIMIT, 1024);
    }
}
