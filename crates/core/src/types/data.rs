//! Self-describing payload carried by one send-text chunk
//!
//! On the wire the payload is a single string `<encoding>:<body>`:
//!
//! | encoding    | body                                    |
//! |-------------|-----------------------------------------|
//! | `text`      | UTF-8 text, delivered as-is             |
//! | `base64`    | standard base64 of raw bytes            |
//! | `kitty-key` | standard base64 of an ASCII key spec    |
//! | `session`   | `start` or `end`                        |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Broadcast session control verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Start,
    End,
}

impl SessionControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionControl::Start => "start",
            SessionControl::End => "end",
        }
    }
}

impl FromStr for SessionControl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(SessionControl::Start),
            "end" => Ok(SessionControl::End),
            other => Err(CoreError::Protocol(format!("Unknown session control: {}", other))),
        }
    }
}

/// Decoded send-text payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendData {
    Text(String),
    Binary(Vec<u8>),
    /// Key spec in the host key table grammar, e.g. `ctrl+c`
    KeyEvent(String),
    Session(SessionControl),
}

impl SendData {
    /// Whether this payload has anything to write to a target
    pub fn is_deliverable(&self) -> bool {
        !matches!(self, SendData::Session(_))
    }

    /// Session verb, if this is a control payload
    pub fn session_control(&self) -> Option<SessionControl> {
        match self {
            SendData::Session(ctl) => Some(*ctl),
            _ => None,
        }
    }

    /// Size of the source data before wire encoding
    pub fn source_len(&self) -> usize {
        match self {
            SendData::Text(text) => text.chars().count(),
            SendData::Binary(data) => data.len(),
            SendData::KeyEvent(key) => key.len(),
            SendData::Session(_) => 0,
        }
    }

    /// Encode to the `<encoding>:<body>` wire form
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SendData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendData::Text(text) => write!(f, "text:{}", text),
            SendData::Binary(data) => write!(f, "base64:{}", STANDARD.encode(data)),
            SendData::KeyEvent(key) => write!(f, "kitty-key:{}", STANDARD.encode(key.as_bytes())),
            SendData::Session(ctl) => write!(f, "session:{}", ctl.as_str()),
        }
    }
}

impl FromStr for SendData {
    type Err = CoreError;

    /// Parse the wire form; an unrecognized encoding tag is `UnknownEncoding`
    fn from_str(wire: &str) -> Result<Self> {
        let (encoding, body) = wire.split_once(':').unwrap_or((wire, ""));
        match encoding {
            "text" => Ok(SendData::Text(body.to_string())),
            "base64" => STANDARD
                .decode(body)
                .map(SendData::Binary)
                .map_err(|e| CoreError::InvalidMessageFormat(format!("Bad base64 payload: {}", e))),
            "kitty-key" => {
                let raw = STANDARD
                    .decode(body)
                    .map_err(|_| CoreError::InvalidKeyEvent(body.to_string()))?;
                let spec = String::from_utf8(raw)
                    .ok()
                    .filter(|s| s.is_ascii())
                    .ok_or_else(|| CoreError::InvalidKeyEvent(body.to_string()))?;
                Ok(SendData::KeyEvent(spec))
            }
            "session" => body.parse().map(SendData::Session),
            other => Err(CoreError::UnknownEncoding(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_keeps_colons_in_body() {
        let data: SendData = "text:a:b:c".parse().unwrap();
        assert_eq!(data, SendData::Text("a:b:c".to_string()));
    }

    #[test]
    fn test_binary_wire_form() {
        let data = SendData::Binary(vec![0, 159, 146, 150]);
        assert_eq!(data.to_wire(), "base64:AJ+Slg==");
        assert_eq!("base64:AJ+Slg==".parse::<SendData>().unwrap(), data);
    }

    #[test]
    fn test_key_event_is_base64_wrapped() {
        let data = SendData::KeyEvent("ctrl+c".to_string());
        let wire = data.to_wire();
        assert!(wire.starts_with("kitty-key:"));
        assert!(!wire.contains("ctrl"));
        assert_eq!(wire.parse::<SendData>().unwrap(), data);
    }

    #[test]
    fn test_key_event_rejects_garbage() {
        let err = "kitty-key:!!!".parse::<SendData>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidKeyEvent(_)));
    }

    #[test]
    fn test_session_controls() {
        assert_eq!(
            "session:start".parse::<SendData>().unwrap(),
            SendData::Session(SessionControl::Start)
        );
        let end: SendData = "session:end".parse().unwrap();
        assert_eq!(end.session_control(), Some(SessionControl::End));
        assert!(!end.is_deliverable());
    }

    #[test]
    fn test_unknown_encoding() {
        let err = "rot13:uryyb".parse::<SendData>().unwrap_err();
        match err {
            CoreError::UnknownEncoding(tag) => assert_eq!(tag, "rot13"),
            other => panic!("Expected UnknownEncoding, got {:?}", other),
        }
        assert!(matches!(
            "".parse::<SendData>().unwrap_err(),
            CoreError::UnknownEncoding(_)
        ));
    }

    #[test]
    fn test_source_len_counts_chars() {
        assert_eq!(SendData::Text("héllo".to_string()).source_len(), 5);
        assert_eq!(SendData::Binary(vec![1, 2, 3]).source_len(), 3);
    }
}
