//! Chat identifiers: notification channels and acquisition recipients.
//!
//! Both are typed in free text during setup, so both accept numeric ids and
//! `@handles`. The two grammars differ on purpose and are parsed
//! independently:
//!
//! | Input        | [`parse_channel`]           | [`parse_recipient`]          |
//! |--------------|-----------------------------|------------------------------|
//! | `""`         | absent                      | `Username("")`               |
//! | `-100`       | absent                      | `Username("-100")`           |
//! | `@name`      | `Handle("@name")`           | `Username("name")`           |
//! | `-1001234`   | `Id(-1001234)`              | `Username("-1001234")`       |
//! | `1234`       | `Id(1234)`                  | `Id(1234)`                   |
//! | `name`       | `Handle("@name")`           | `Username("name")`           |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel typed during setup to disable notifications.
const DISABLED_CHANNEL: &str = "-100";

/// Where a user's notifications are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelTarget {
    /// Numeric chat id (channels are negative).
    Id(i64),
    /// Public handle, always stored with its leading `@`.
    Handle(String),
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelTarget::Id(id) => write!(f, "{}", id),
            ChannelTarget::Handle(handle) => f.write_str(handle),
        }
    }
}

/// Who receives an acquired item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    /// Numeric user id.
    Id(i64),
    /// Username without the leading `@`, or literal text that was neither.
    Username(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Id(id) => write!(f, "{}", id),
            Recipient::Username(name) => write!(f, "@{}", name),
        }
    }
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a notification channel from setup text.
///
/// Returns `None` for empty input and for the `-100` sentinel.
pub fn parse_channel(value: &str) -> Option<ChannelTarget> {
    if value.is_empty() || value == DISABLED_CHANNEL {
        return None;
    }

    if value.starts_with('@') {
        return Some(ChannelTarget::Handle(value.to_string()));
    }

    if let Some(digits) = value.strip_prefix('-') {
        if is_ascii_digits(digits) {
            if let Ok(id) = value.parse() {
                return Some(ChannelTarget::Id(id));
            }
        }
    }

    if is_ascii_digits(value) {
        if let Ok(id) = value.parse() {
            return Some(ChannelTarget::Id(id));
        }
    }

    Some(ChannelTarget::Handle(format!("@{}", value)))
}

/// Parse a single recipient. Surrounding whitespace is ignored.
pub fn parse_recipient(value: &str) -> Recipient {
    let value = value.trim();

    if let Some(name) = value.strip_prefix('@') {
        return Recipient::Username(name.to_string());
    }

    if is_ascii_digits(value) {
        if let Ok(id) = value.parse() {
            return Recipient::Id(id);
        }
    }

    Recipient::Username(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_absent() {
        assert_eq!(parse_channel(""), None);
        assert_eq!(parse_channel("-100"), None);
    }

    #[test]
    fn test_channel_forms() {
        assert_eq!(
            parse_channel("@mychannel"),
            Some(ChannelTarget::Handle("@mychannel".into()))
        );
        assert_eq!(
            parse_channel("-1001234567890"),
            Some(ChannelTarget::Id(-1001234567890))
        );
        assert_eq!(parse_channel("777"), Some(ChannelTarget::Id(777)));
        assert_eq!(
            parse_channel("mychannel"),
            Some(ChannelTarget::Handle("@mychannel".into()))
        );
        // Minus followed by non-digits is coerced like any other bare text
        assert_eq!(
            parse_channel("-abc"),
            Some(ChannelTarget::Handle("@-abc".into()))
        );
    }

    #[test]
    fn test_recipient_forms() {
        assert_eq!(parse_recipient(" @bob "), Recipient::Username("bob".into()));
        assert_eq!(parse_recipient("123456789"), Recipient::Id(123456789));
        assert_eq!(parse_recipient("alice"), Recipient::Username("alice".into()));
        assert_eq!(parse_recipient("-5"), Recipient::Username("-5".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelTarget::Id(-100123).to_string(), "-100123");
        assert_eq!(ChannelTarget::Handle("@chan".into()).to_string(), "@chan");
        assert_eq!(Recipient::Username("bob".into()).to_string(), "@bob");
        assert_eq!(Recipient::Id(42).to_string(), "42");
    }
}
