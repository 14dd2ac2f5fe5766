//! Error types for the transport layer.
//!
//! Same shape as the rest of the workspace: a flat `thiserror` enum whose
//! variants own their data. External errors (reqwest, url) are converted to
//! strings at the boundary so the enum stays `Clone` and free of generics.

use thiserror::Error;

/// Errors that can occur while talking to the messaging backend.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network/HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// An operation that needs a live session was called while disconnected.
    #[error("not connected")]
    NotConnected,

    /// Configuration errors (e.g., missing env vars, bad base URL).
    #[error("config error: {0}")]
    Config(String),

    /// No data available (e.g., mock not configured).
    #[error("no data: {0}")]
    NoData(String),

    /// The backend answered but refused the request.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl TransportError {
    /// Returns true if the backend no longer holds the session: the handle
    /// has to reconnect before it is usable again.
    ///
    /// Network failures count, as do 401 and 404 answers from the gateway.
    pub fn is_session_lost(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Rejected { status, .. } => matches!(status, 401 | 404),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    #[inline]
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    #[inline]
    fn from(err: url::ParseError) -> Self {
        TransportError::Config(format!("invalid url: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lost() {
        assert!(TransportError::Network("timeout".into()).is_session_lost());
        assert!(TransportError::Rejected { status: 404, body: String::new() }.is_session_lost());
        assert!(TransportError::Rejected { status: 401, body: String::new() }.is_session_lost());
        assert!(!TransportError::Rejected { status: 400, body: String::new() }.is_session_lost());
        assert!(!TransportError::NotConnected.is_session_lost());
        assert!(!TransportError::NoData("empty".into()).is_session_lost());
    }
}
