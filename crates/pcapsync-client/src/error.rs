//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
///
/// Frame decode failures are not listed here: they are recovered inside
/// the dispatcher and never end a session.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Connection to the server failed or was lost.
    Connection(String),
    /// Fetching the bootstrap snapshot failed.
    Bootstrap(String),
    /// Serialization error.
    Protocol(String),
    /// Operation timed out.
    Timeout(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Bootstrap(msg) => write!(f, "bootstrap failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_prefixes() {
        assert_eq!(
            ClientError::Bootstrap("HTTP 500".into()).to_string(),
            "bootstrap failed: HTTP 500"
        );
        assert_eq!(
            ClientError::Timeout("connecting".into()).to_string(),
            "timeout: connecting"
        );
    }

    #[test]
    fn io_error_keeps_source() {
        let err: ClientError = std::io::Error::other("boom").into();
        assert!(err.source().is_some());
        assert!(ClientError::Config("bad".into()).source().is_none());
    }
}
