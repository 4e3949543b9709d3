//! Network protocol messages

use serde::{Deserialize, Serialize};
use crate::{AuthToken, CoreError, PROTOCOL_VERSION, APP_VERSION_STRING, Result};
use super::SendTextRequest;

/// Network message type for the QUIC control stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NetworkMessage {
    /// Protocol handshake
    ///
    /// Client → host carries the token; the host echoes a tokenless Hello
    /// once the client is authenticated.
    Hello {
        protocol_version: u32,  // MUST match PROTOCOL_VERSION
        app_version: String,     // For logging only
        auth_token: Option<AuthToken>,
    },

    /// One send-text chunk. No response on success.
    SendText(SendTextRequest),

    /// Request failure reported back to the client
    Error { message: String },

    /// Heartbeat/ping
    Ping { timestamp: u64 },

    /// Pong response
    Pong { timestamp: u64 },

    /// Connection close
    Close,
}

impl NetworkMessage {
    /// Create hello message
    pub fn hello(token: Option<AuthToken>) -> Self {
        Self::Hello {
            protocol_version: PROTOCOL_VERSION,
            app_version: APP_VERSION_STRING.to_string(),
            auth_token: token,
        }
    }

    /// Validate handshake message
    pub fn validate_handshake(&self) -> Result<()> {
        match self {
            NetworkMessage::Hello { protocol_version, .. } => {
                if *protocol_version == PROTOCOL_VERSION {
                    Ok(())
                } else {
                    Err(CoreError::ProtocolVersionMismatch {
                        expected: PROTOCOL_VERSION,
                        got: *protocol_version,
                    })
                }
            }
            _ => Err(CoreError::InvalidHandshake),
        }
    }

    /// Create error report
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Create ping message
    pub fn ping() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::Ping { timestamp }
    }

    /// Create pong response
    pub fn pong(timestamp: u64) -> Self {
        Self::Pong { timestamp }
    }
}
