//! Range and option parsing.
//!
//! Ranges arrive in two dialects and the two are deliberately kept apart:
//!
//! - **Text** ([`parse_ranges_text`]): typed by the user during setup as
//!   `minPrice-maxPrice:supplyLimit:quantity:recipients`, ranges separated by
//!   `;`, recipients separated by `,`. Strict: one malformed range rejects
//!   the whole input so the user can correct it.
//!
//! - **Structured** ([`parse_ranges_structured`]): the persisted JSON list
//!   (or a JSON string containing that list). Tolerant: entries missing any
//!   of the five fields are dropped and the rest are kept.

use serde_json::Value;

use crate::config::AcquisitionRange;
use crate::error::ParseError;
use crate::target::{parse_recipient, Recipient};

const RANGE_FIELDS: [&str; 5] = ["min_price", "max_price", "supply_limit", "quantity", "recipients"];

fn parse_int<T: std::str::FromStr>(value: &str) -> Result<T, ParseError> {
    let value = value.trim();
    value
        .parse()
        .map_err(|_| ParseError::InvalidNumber(value.to_string()))
}

fn split_recipients(value: &str) -> Vec<Recipient> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_recipient)
        .collect()
}

fn parse_range_item(item: &str) -> Result<AcquisitionRange, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedRange {
        input: item.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = item.split(':').collect();
    let [prices, supply_limit, quantity, recipients] = parts.as_slice() else {
        return Err(malformed("expected 4 `:`-separated fields"));
    };

    let (min, max) = prices
        .split_once('-')
        .ok_or_else(|| malformed("expected `min-max` price bounds"))?;
    if max.contains('-') {
        return Err(malformed("expected `min-max` price bounds"));
    }

    let min_price: i64 = parse_int(min)?;
    let max_price: i64 = parse_int(max)?;
    if min_price > max_price {
        return Err(ParseError::InvalidPriceBounds {
            min: min_price,
            max: max_price,
        });
    }

    Ok(AcquisitionRange {
        min_price,
        max_price,
        supply_limit: parse_int(supply_limit)?,
        quantity: parse_int(quantity)?,
        recipients: split_recipients(recipients),
    })
}

/// Parse ranges from setup text.
///
/// # Example
///
/// ```rust
/// use gb_types::{parse_ranges_text, Recipient};
///
/// let ranges = parse_ranges_text("1-1000:500000:1:@alice,123; 1001-5000:10000:2:bob").unwrap();
/// assert_eq!(ranges.len(), 2);
/// assert_eq!(ranges[0].recipients[1], Recipient::Id(123));
///
/// assert!(parse_ranges_text("1-1000:500000:1").is_err());
/// ```
///
/// # Errors
///
/// Returns [`ParseError::Empty`] if no range is present and the first
/// range-level error otherwise.
pub fn parse_ranges_text(text: &str) -> Result<Vec<AcquisitionRange>, ParseError> {
    let ranges = text
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_range_item)
        .collect::<Result<Vec<_>, _>>()?;

    if ranges.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(ranges)
}

fn structured_recipients(value: &Value) -> Option<Vec<Recipient>> {
    match value {
        Value::String(s) => Some(split_recipients(s)),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(parse_recipient(s)),
                    Value::Number(n) => n.as_i64().map(Recipient::Id),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn structured_range(value: &Value) -> Option<AcquisitionRange> {
    let obj = value.as_object()?;
    if !RANGE_FIELDS.iter().all(|key| obj.contains_key(*key)) {
        return None;
    }

    let range = AcquisitionRange {
        min_price: obj["min_price"].as_i64()?,
        max_price: obj["max_price"].as_i64()?,
        supply_limit: obj["supply_limit"].as_i64()?,
        quantity: u32::try_from(obj["quantity"].as_u64()?).ok()?,
        recipients: structured_recipients(&obj["recipients"])?,
    };

    (range.min_price <= range.max_price).then_some(range)
}

/// Parse ranges from a persisted record.
///
/// Accepts a JSON list or a string holding a JSON list. Anything else, and
/// any entry that is incomplete or mistyped, is dropped.
pub fn parse_ranges_structured(value: &Value) -> Vec<AcquisitionRange> {
    let decoded;
    let value = match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                decoded = v;
                &decoded
            }
            Err(e) => {
                tracing::error!("Invalid JSON in gift ranges: {}", e);
                return Vec::new();
            }
        },
        other => other,
    };

    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let range = structured_range(item);
            if range.is_none() {
                tracing::debug!("Dropping incomplete gift range: {}", item);
            }
            range
        })
        .collect()
}

/// Purchase flags collected at the end of setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalOptions {
    pub upgradable_only: bool,
    pub prioritize_low_supply: bool,
}

/// Parse `upgradable_only:true,prioritize_low_supply:false`.
///
/// Unknown keys are ignored. Input that does not follow `key:value` pairs
/// leaves both flags at their defaults.
pub fn parse_final_options(text: &str) -> FinalOptions {
    let mut options = FinalOptions::default();

    for option in text.split(',') {
        let Some((key, value)) = option.split_once(':') else {
            return FinalOptions::default();
        };
        if value.contains(':') {
            return FinalOptions::default();
        }

        let enabled = value.trim().eq_ignore_ascii_case("true");
        match key.trim() {
            "upgradable_only" => options.upgradable_only = enabled,
            "prioritize_low_supply" => options.prioritize_low_supply = enabled,
            _ => {}
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_single_range() {
        let ranges = parse_ranges_text("1-1000:500000:1:@username,123456789").unwrap();
        assert_eq!(
            ranges,
            vec![AcquisitionRange {
                min_price: 1,
                max_price: 1000,
                supply_limit: 500000,
                quantity: 1,
                recipients: vec![
                    Recipient::Username("username".into()),
                    Recipient::Id(123456789)
                ],
            }]
        );
    }

    #[test]
    fn test_text_keeps_order_and_duplicates() {
        let ranges = parse_ranges_text(" 1-10:5:1:@a,@a ;; 5-50:5:3:@b ; ").unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].recipients.len(), 2);
        assert_eq!(ranges[1].quantity, 3);
    }

    #[test]
    fn test_text_is_strict() {
        assert_eq!(parse_ranges_text(""), Err(ParseError::Empty));
        assert_eq!(parse_ranges_text(" ; "), Err(ParseError::Empty));

        // One bad range rejects the whole input
        let err = parse_ranges_text("1-10:5:1:@a;oops").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRange { .. }));

        assert!(matches!(
            parse_ranges_text("1-10:5:1:@a:extra"),
            Err(ParseError::MalformedRange { .. })
        ));
        assert!(matches!(
            parse_ranges_text("10:5:1:@a"),
            Err(ParseError::MalformedRange { .. })
        ));
        assert_eq!(
            parse_ranges_text("1-x:5:1:@a"),
            Err(ParseError::InvalidNumber("x".into()))
        );
        assert_eq!(
            parse_ranges_text("1-10:5:-1:@a"),
            Err(ParseError::InvalidNumber("-1".into()))
        );
        assert_eq!(
            parse_ranges_text("50-10:5:1:@a"),
            Err(ParseError::InvalidPriceBounds { min: 50, max: 10 })
        );
    }

    #[test]
    fn test_structured_drops_incomplete() {
        let value = json!([
            {"min_price": 1, "max_price": 100, "supply_limit": 10, "quantity": 1, "recipients": ["@a", 7]},
            {"min_price": 1, "max_price": 100, "supply_limit": 10, "quantity": 1},
            "not a range",
            {"min_price": 200, "max_price": 300, "supply_limit": 10, "quantity": 2, "recipients": "b, @c"}
        ]);

        let ranges = parse_ranges_structured(&value);
        assert_eq!(ranges.len(), 2);
        assert_eq!(
            ranges[0].recipients,
            vec![Recipient::Username("a".into()), Recipient::Id(7)]
        );
        assert_eq!(
            ranges[1].recipients,
            vec![Recipient::Username("b".into()), Recipient::Username("c".into())]
        );
    }

    #[test]
    fn test_structured_accepts_encoded_string() {
        let value = json!("[{\"min_price\":1,\"max_price\":2,\"supply_limit\":3,\"quantity\":4,\"recipients\":[]}]");
        let ranges = parse_ranges_structured(&value);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].quantity, 4);
    }

    #[test]
    fn test_structured_garbage_is_empty() {
        assert!(parse_ranges_structured(&json!("{not json")).is_empty());
        assert!(parse_ranges_structured(&json!({"min_price": 1})).is_empty());
        assert!(parse_ranges_structured(&Value::Null).is_empty());
    }

    #[test]
    fn test_final_options() {
        assert_eq!(
            parse_final_options("upgradable_only:false,prioritize_low_supply:true"),
            FinalOptions {
                upgradable_only: false,
                prioritize_low_supply: true
            }
        );
        assert_eq!(
            parse_final_options(" upgradable_only : TRUE , colour:blue"),
            FinalOptions {
                upgradable_only: true,
                prioritize_low_supply: false
            }
        );
        assert_eq!(parse_final_options("garbage"), FinalOptions::default());
    }
}
