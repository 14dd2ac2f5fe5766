//! Error types for the detector.

use gb_ingestion::TransportError;
use thiserror::Error;

/// History load/save failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },

    /// Snapshot could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Stored snapshot could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure forwarding a single item or sending a notification.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Error from the transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The handler refused the item for a reason of its own.
    #[error("handler error: {0}")]
    Handler(String),
}
