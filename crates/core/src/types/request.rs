//! One send-text request (one chunk on the wire)

use serde::{Deserialize, Serialize};

use super::SendData;
use crate::error::Result;

/// Request payload for a single chunk
///
/// `data` stays in its self-describing wire form until the host decodes it,
/// so an unknown encoding surfaces as a protocol error instead of a
/// deserialization failure of the whole frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendTextRequest {
    /// Window match expression
    pub match_spec: Option<String>,
    /// Tab match expression
    pub match_tab: Option<String>,
    /// Send to every window, ignoring match expressions
    pub all: bool,
    /// Never send to the active window
    pub exclude_active: bool,
    /// `<encoding>:<body>`, see [`SendData`]
    pub data: String,
    /// Broadcast session id; empty means none
    pub session_id: String,
    /// Window the client was started from, if any
    pub origin: Option<u64>,
}

impl SendTextRequest {
    /// Copy of this request carrying `data` instead
    pub fn with_data(&self, data: &SendData) -> Self {
        Self {
            data: data.to_wire(),
            ..self.clone()
        }
    }

    /// Decode the data field
    pub fn decode_data(&self) -> Result<SendData> {
        self.data.parse()
    }

    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionControl;

    #[test]
    fn test_with_data_keeps_routing_fields() {
        let base = SendTextRequest {
            match_tab: Some("title:build".to_string()),
            exclude_active: true,
            session_id: "s1".to_string(),
            ..Default::default()
        };
        let req = base.with_data(&SendData::Text("ls\r".to_string()));
        assert_eq!(req.match_tab.as_deref(), Some("title:build"));
        assert!(req.exclude_active);
        assert!(req.has_session());
        assert_eq!(req.decode_data().unwrap(), SendData::Text("ls\r".to_string()));
    }

    #[test]
    fn test_session_control_request() {
        let req = SendTextRequest::default().with_data(&SendData::Session(SessionControl::End));
        assert_eq!(req.data, "session:end");
        assert!(!req.has_session());
    }
}
