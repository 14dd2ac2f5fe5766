//! Error types for the orchestrator.

use gb_ingestion::TransportError;
use gb_types::{ConfigError, UserId};
use thiserror::Error;

/// Configuration store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },

    /// Records could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Stored records could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),

    /// A stored record is not a valid configuration.
    #[error("invalid user record: {0}")]
    Invalid(#[from] ConfigError),
}

/// Errors returned by lifecycle operations.
///
/// Each one concerns a single user; none of them affects other sessions.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The user's configuration is unusable (e.g. incomplete credentials).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The transport handle could not be opened or connected.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No configuration exists for this user.
    #[error("user {0} not found")]
    NotFound(UserId),

    /// A stop for this user is still in progress.
    #[error("user {0} is stopping")]
    Stopping(UserId),

    /// A stop arrived while the session was being started.
    #[error("start of user {0} was interrupted by a stop")]
    Interrupted(UserId),

    /// The start task panicked or was torn down with the runtime.
    #[error("start of user {user_id} failed: {message}")]
    Launch { user_id: UserId, message: String },

    /// Error from the configuration store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
