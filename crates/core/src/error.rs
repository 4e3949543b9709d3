//! Error types for textcast-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    /// A match predicate resolved to nothing (`kind` is "tabs" or "windows")
    #[error("No matching {kind} for expression: {spec}")]
    NoMatch { spec: String, kind: &'static str },

    #[error("Could not decode key event: {0}")]
    InvalidKeyEvent(String),

    #[error("Invalid encoding for send-text data: {0}")]
    UnknownEncoding(String),

    #[error("Invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    ProtocolVersionMismatch { expected: u32, got: u32 },

    #[error("Invalid handshake message")]
    InvalidHandshake,

    #[error("Authentication failed: invalid token")]
    AuthFailed,

    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Fingerprint mismatch: expected {expected}, got {got}")]
    FingerprintMismatch { expected: String, got: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Tab predicate matched zero tabs
    pub fn no_tabs(spec: impl Into<String>) -> Self {
        CoreError::NoMatch {
            spec: spec.into(),
            kind: "tabs",
        }
    }
}

impl From<quinn::ConnectionError> for CoreError {
    fn from(err: quinn::ConnectionError) -> Self {
        CoreError::Connection(err.to_string())
    }
}

impl From<quinn::WriteError> for CoreError {
    fn from(err: quinn::WriteError) -> Self {
        CoreError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, err))
    }
}

impl From<quinn::ReadExactError> for CoreError {
    fn from(err: quinn::ReadExactError) -> Self {
        CoreError::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_display() {
        let err = CoreError::no_tabs("title:build");
        assert_eq!(err.to_string(), "No matching tabs for expression: title:build");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_unknown_encoding_display() {
        let err = CoreError::UnknownEncoding("rot13".to_string());
        assert_eq!(err.to_string(), "Invalid encoding for send-text data: rot13");
    }
}
