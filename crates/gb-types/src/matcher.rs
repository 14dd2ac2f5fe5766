//! Range matching.
//!
//! Ranges are evaluated in declaration order and the first one that fits is
//! authoritative. Overlapping ranges are allowed; order resolves them.
//! Nothing is merged across ranges and nothing is remembered across calls.

use crate::config::AcquisitionRange;
use crate::target::Recipient;

/// Result of matching one item against a user's ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeMatch {
    pub matched: bool,
    /// Units to acquire, zero when unmatched.
    pub quantity: u32,
    /// Recipients of the matching range, empty when unmatched.
    pub recipients: Vec<Recipient>,
}

impl RangeMatch {
    /// The "no range fits" result.
    pub fn unmatched() -> Self {
        Self::default()
    }
}

impl From<&AcquisitionRange> for RangeMatch {
    fn from(range: &AcquisitionRange) -> Self {
        Self {
            matched: true,
            quantity: range.quantity,
            recipients: range.recipients.clone(),
        }
    }
}

/// First range containing `(price, total_amount)`, if any.
pub fn find_range(
    ranges: &[AcquisitionRange],
    price: i64,
    total_amount: i64,
) -> Option<&AcquisitionRange> {
    ranges.iter().find(|r| r.contains(price, total_amount))
}

/// Match an item's price and supply against `ranges`.
pub fn match_range(ranges: &[AcquisitionRange], price: i64, total_amount: i64) -> RangeMatch {
    find_range(ranges, price, total_amount)
        .map(RangeMatch::from)
        .unwrap_or_else(RangeMatch::unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_ranges_text;

    #[test]
    fn test_bounds_are_inclusive() {
        let ranges = parse_ranges_text("10-20:100:1:@a").unwrap();
        assert!(match_range(&ranges, 10, 100).matched);
        assert!(match_range(&ranges, 20, 0).matched);
        assert!(!match_range(&ranges, 9, 0).matched);
        assert!(!match_range(&ranges, 21, 0).matched);
        assert!(!match_range(&ranges, 15, 101).matched);
    }

    #[test]
    fn test_first_declared_range_wins() {
        let ranges = parse_ranges_text("1-100:1000:1:@first;1-100:1000:5:@second").unwrap();
        let hit = match_range(&ranges, 50, 10);
        assert_eq!(hit.quantity, 1);
        assert_eq!(hit.recipients, vec![Recipient::Username("first".into())]);
    }

    #[test]
    fn test_later_range_used_when_earlier_fails_supply() {
        let ranges = parse_ranges_text("1-100:10:1:@tight;1-100:1000:3:@loose").unwrap();
        let hit = match_range(&ranges, 50, 500);
        assert_eq!(hit.quantity, 3);
        assert_eq!(hit.recipients, vec![Recipient::Username("loose".into())]);
    }

    #[test]
    fn test_unmatched_is_empty() {
        let hit = match_range(&[], 50, 10);
        assert_eq!(hit, RangeMatch::unmatched());
        assert_eq!(hit.quantity, 0);
        assert!(hit.recipients.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let ranges = parse_ranges_text("1-100:1000:1:@a;50-60:1000:2:@b").unwrap();
        let first = match_range(&ranges, 55, 10);
        for _ in 0..10 {
            assert_eq!(match_range(&ranges, 55, 10), first);
        }
    }
}
