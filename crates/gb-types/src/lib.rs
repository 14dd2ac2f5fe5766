//! gb-types: Shared data model for the gift sniper.
//!
//! This crate defines the types every other crate in the workspace speaks:
//! - [`ItemRecord`] - One marketplace item ("gift") as listed by the transport
//! - [`AcquisitionRange`] - A price/supply window mapped to a quantity and recipients
//! - [`UserConfig`] - One authorized user's settings, built from a [`RawUserConfig`]
//! - [`ChannelTarget`] / [`Recipient`] - Parsed chat identifiers
//!
//! It also hosts the two pure pieces of the matching pipeline:
//! configuration parsing ([`parse`]) and the range matcher ([`matcher`]).
//!
//! # Example
//!
//! ```rust
//! use gb_types::{parse_ranges_text, match_range, Recipient};
//!
//! let ranges = parse_ranges_text("1-1000:100000:1:@bob").unwrap();
//!
//! let hit = match_range(&ranges, 50, 10);
//! assert!(hit.matched);
//! assert_eq!(hit.recipients, vec![Recipient::Username("bob".to_string())]);
//!
//! let miss = match_range(&ranges, 5000, 10);
//! assert!(!miss.matched);
//! ```

mod config;
mod error;
mod item;
pub mod matcher;
pub mod parse;
mod target;

pub use config::{AcquisitionRange, Credentials, RawUserConfig, UserConfig, DEFAULT_INTERVAL_SECS};
pub use error::{ConfigError, ParseError};
pub use item::ItemRecord;
pub use matcher::{find_range, match_range, RangeMatch};
pub use parse::{parse_final_options, parse_ranges_structured, parse_ranges_text, FinalOptions};
pub use target::{parse_channel, parse_recipient, ChannelTarget, Recipient};

/// Opaque user key shared by the configuration store, the history store and
/// the orchestrator registry.
pub type UserId = i64;
