//! Error types for gb-types.

use thiserror::Error;

use crate::UserId;

/// Errors produced while parsing user-supplied text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input contained no ranges at all.
    #[error("no ranges provided")]
    Empty,

    /// A range did not follow `min-max:supply:quantity:recipients`.
    #[error("malformed range `{input}`: {reason}")]
    MalformedRange { input: String, reason: String },

    /// A numeric field could not be parsed.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    /// `min_price` was greater than `max_price`.
    #[error("min price {min} exceeds max price {max}")]
    InvalidPriceBounds { min: i64, max: i64 },
}

/// Errors that make a user configuration unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// api id, api hash or phone number is missing.
    #[error("incomplete credentials for user {0}")]
    IncompleteCredentials(UserId),

    /// Poll interval must be a finite number of seconds greater than zero.
    #[error("invalid poll interval {0}")]
    InvalidInterval(f64),

    /// Malformed range text or option text.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}
