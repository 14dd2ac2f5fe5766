//! Per-user configuration.
//!
//! A [`RawUserConfig`] is the persisted record exactly as the configuration
//! store keeps it. [`UserConfig::from_raw`] turns it into the typed form the
//! detection pipeline uses, parsing the channel and the ranges on the way.
//! [`UserConfig::to_raw`] goes the other direction for persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::matcher::{match_range, RangeMatch};
use crate::parse::parse_ranges_structured;
use crate::target::{parse_channel, ChannelTarget, Recipient};
use crate::UserId;

/// Poll interval used when the record does not specify one.
pub const DEFAULT_INTERVAL_SECS: f64 = 15.0;

const DEFAULT_LANGUAGE: &str = "en";

/// One acquisition rule.
///
/// An item matches when `min_price <= price <= max_price` and its total
/// supply is at most `supply_limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionRange {
    pub min_price: i64,
    pub max_price: i64,
    pub supply_limit: i64,
    /// Units to acquire when matched.
    pub quantity: u32,
    /// Recipients in assignment order. Duplicates are allowed.
    pub recipients: Vec<Recipient>,
}

impl AcquisitionRange {
    /// Returns true if an item with this price and supply fits the range.
    #[inline]
    pub fn contains(&self, price: i64, total_amount: i64) -> bool {
        self.min_price <= price && price <= self.max_price && total_amount <= self.supply_limit
    }
}

/// Credentials for the user's messaging account.
///
/// Opaque to the core: they are validated for presence and handed to the
/// transport factory unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i64,
    pub api_hash: String,
    pub phone_number: String,
    /// Where the transport keeps its session state.
    pub session_path: String,
}

impl Credentials {
    /// Returns true if every field the transport needs is filled in.
    pub fn is_complete(&self) -> bool {
        self.api_id != 0 && !self.api_hash.trim().is_empty() && !self.phone_number.trim().is_empty()
    }

    /// Fail with [`ConfigError::IncompleteCredentials`] unless complete.
    pub fn validate(&self, user_id: UserId) -> Result<(), ConfigError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ConfigError::IncompleteCredentials(user_id))
        }
    }
}

// Keep the hash out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone_number", &self.phone_number)
            .field("session_path", &self.session_path)
            .finish()
    }
}

/// Persisted user record.
///
/// `gift_ranges` is kept as raw JSON because older records store the list as
/// a JSON-encoded string rather than a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUserConfig {
    pub user_id: UserId,
    #[serde(default)]
    pub api_id: i64,
    #[serde(default)]
    pub api_hash: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: f64,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub gift_ranges: Value,
    #[serde(default)]
    pub purchase_only_upgradable_gifts: bool,
    #[serde(default)]
    pub prioritize_low_supply: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub session_file_path: Option<String>,
}

fn default_interval() -> f64 {
    DEFAULT_INTERVAL_SECS
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl RawUserConfig {
    /// A record with defaults for everything except the user id.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            api_id: 0,
            api_hash: String::new(),
            phone_number: String::new(),
            channel_id: None,
            interval: DEFAULT_INTERVAL_SECS,
            language: DEFAULT_LANGUAGE.to_string(),
            gift_ranges: Value::Null,
            purchase_only_upgradable_gifts: false,
            prioritize_low_supply: false,
            is_active: false,
            session_file_path: None,
        }
    }
}

/// Typed configuration for one authorized user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub user_id: UserId,
    pub credentials: Credentials,
    /// Notification target; `None` disables notifications.
    pub channel: Option<ChannelTarget>,
    /// Seconds between poll cycles. Always finite and positive.
    pub interval_secs: f64,
    /// Lower-cased language tag.
    pub language: String,
    /// Evaluated in declaration order; the first match wins.
    pub ranges: Vec<AcquisitionRange>,
    pub upgradable_only: bool,
    pub prioritize_low_supply: bool,
    pub is_active: bool,
}

impl UserConfig {
    /// Build a typed configuration from a persisted record.
    ///
    /// Ranges go through the tolerant structured dialect: incomplete entries
    /// are dropped rather than failing the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInterval`] if the interval is not a
    /// positive, finite number of seconds.
    pub fn from_raw(raw: RawUserConfig) -> Result<Self, ConfigError> {
        if !raw.interval.is_finite() || raw.interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(raw.interval));
        }

        let ranges = parse_ranges_structured(&raw.gift_ranges);
        let channel = raw.channel_id.as_deref().and_then(parse_channel);
        let session_path = raw
            .session_file_path
            .unwrap_or_else(|| format!("data/sessions/user_{}", raw.user_id));

        Ok(Self {
            user_id: raw.user_id,
            credentials: Credentials {
                api_id: raw.api_id,
                api_hash: raw.api_hash,
                phone_number: raw.phone_number,
                session_path,
            },
            channel,
            interval_secs: raw.interval,
            language: raw.language.to_lowercase(),
            ranges,
            upgradable_only: raw.purchase_only_upgradable_gifts,
            prioritize_low_supply: raw.prioritize_low_supply,
            is_active: raw.is_active,
        })
    }

    /// Convert back to the persisted record.
    pub fn to_raw(&self) -> RawUserConfig {
        RawUserConfig {
            user_id: self.user_id,
            api_id: self.credentials.api_id,
            api_hash: self.credentials.api_hash.clone(),
            phone_number: self.credentials.phone_number.clone(),
            channel_id: self.channel.as_ref().map(ToString::to_string),
            interval: self.interval_secs,
            language: self.language.clone(),
            gift_ranges: serde_json::to_value(&self.ranges).unwrap_or(Value::Null),
            purchase_only_upgradable_gifts: self.upgradable_only,
            prioritize_low_supply: self.prioritize_low_supply,
            is_active: self.is_active,
            session_file_path: Some(self.credentials.session_path.clone()),
        }
    }

    /// Poll interval as a [`Duration`].
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    /// Run the range matcher against this user's ranges.
    pub fn matching_range(&self, price: i64, total_amount: i64) -> RangeMatch {
        match_range(&self.ranges, price, total_amount)
    }
}
