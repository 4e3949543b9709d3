//! Connection details handed from the host to clients
//!
//! The host exports this as JSON in the `TEXTCAST_CONNECT` environment
//! variable of every shell it spawns, so `textcast` run inside a window
//! needs no flags to reach its host.

use crate::error::{CoreError, Result};
use crate::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Environment variable holding [`ConnectInfo`] as JSON
pub const CONNECT_ENV: &str = "TEXTCAST_CONNECT";

/// Environment variable holding the id of the window a shell runs in
pub const WINDOW_ID_ENV: &str = "TEXTCAST_WINDOW_ID";

/// Everything a client needs to reach and trust a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectInfo {
    /// Host address
    pub addr: SocketAddr,

    /// Certificate fingerprint (SHA-256, hex format with colons)
    pub fingerprint: String,

    /// Auth token (hex format)
    pub token: String,

    /// Protocol version
    pub protocol_version: u32,
}

impl ConnectInfo {
    pub fn new(addr: SocketAddr, fingerprint: String, token: String) -> Self {
        Self {
            addr,
            fingerprint,
            token,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CoreError::Protocol(format!("JSON serialization failed: {}", e)))
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Protocol(format!("JSON deserialization failed: {}", e)))
    }

    /// Read from `TEXTCAST_CONNECT`, if set
    pub fn from_env() -> Option<Result<Self>> {
        std::env::var(CONNECT_ENV).ok().map(|json| Self::from_json(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let info = ConnectInfo::new(
            "127.0.0.1:8443".parse().unwrap(),
            "aa:bb".to_string(),
            "00".repeat(32),
        );
        let json = info.to_json().unwrap();
        assert!(json.contains("\"addr\":\"127.0.0.1:8443\""));
        assert_eq!(ConnectInfo::from_json(&json).unwrap(), info);
    }

    #[test]
    fn test_from_json_invalid() {
        let result = ConnectInfo::from_json("{\"addr\": 5}");
        assert!(matches!(result, Err(CoreError::Protocol(_))));
    }
}
