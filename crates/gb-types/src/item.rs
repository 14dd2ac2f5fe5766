//! Marketplace item snapshot.
//!
//! This module provides [`ItemRecord`], one entry of the transport's
//! "currently listed items" response. Only the attributes the detection
//! pipeline reads are typed; everything else the transport sends is kept in
//! [`ItemRecord::extra`] so it survives a load, forward and save cycle
//! untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One marketplace item as listed by the transport.
///
/// # Fields
///
/// - `id`: Unique within a snapshot, the key of the history mapping
/// - `price`: Star price, the input to range matching
/// - `is_limited` / `total_amount`: Supply cap, meaningful only when limited
/// - `is_sold_out`: Whether the remaining supply is exhausted
/// - `upgrade_price`: Present when the item supports an upgrade path
///
/// Optional fields are omitted on serialization when absent, so a record
/// read from history is written back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Item identifier.
    pub id: i64,

    /// Price in stars.
    #[serde(default)]
    pub price: i64,

    /// Whether the item has a supply cap.
    #[serde(default)]
    pub is_limited: bool,

    /// Whether the item can no longer be acquired.
    #[serde(default)]
    pub is_sold_out: bool,

    /// Total supply. Only meaningful when `is_limited` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<i64>,

    /// Upgrade price, present only for upgradable items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_price: Option<i64>,

    /// Attributes this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    /// Create an unlimited, available item with no extra attributes.
    pub fn new(id: i64, price: i64) -> Self {
        Self {
            id,
            price,
            is_limited: false,
            is_sold_out: false,
            total_amount: None,
            upgrade_price: None,
            extra: Map::new(),
        }
    }

    /// Mark the item as limited with the given total supply.
    pub fn limited(mut self, total_amount: i64) -> Self {
        self.is_limited = true;
        self.total_amount = Some(total_amount);
        self
    }

    /// Mark the item as sold out.
    pub fn sold_out(mut self) -> Self {
        self.is_sold_out = true;
        self
    }

    /// Give the item an upgrade path.
    pub fn with_upgrade_price(mut self, price: i64) -> Self {
        self.upgrade_price = Some(price);
        self
    }

    /// Attach an uninterpreted attribute.
    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Supply cap used for low-supply prioritization.
    ///
    /// Returns `None` for unlimited items and for limited items whose total
    /// is unknown; both sort after every item with a known cap.
    #[inline]
    pub fn supply(&self) -> Option<i64> {
        if self.is_limited {
            self.total_amount
        } else {
            None
        }
    }

    /// Returns true if the item advertises an upgrade price.
    #[inline]
    pub fn is_upgradable(&self) -> bool {
        self.upgrade_price.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_attributes_round_trip() {
        let raw = json!({
            "id": 5170145012310081615_i64,
            "price": 15,
            "is_limited": true,
            "is_sold_out": false,
            "total_amount": 500,
            "sticker": {"file_id": "CAACAgIAAxUAAWhl", "emoji": "🎁"},
            "available_amount": 12
        });

        let item: ItemRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.total_amount, Some(500));
        assert_eq!(item.extra["available_amount"], json!(12));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_absent_optionals_stay_absent() {
        let item: ItemRecord = serde_json::from_value(json!({"id": 1, "price": 5})).unwrap();
        assert!(!item.is_limited);
        assert!(!item.is_upgradable());

        let back = serde_json::to_value(&item).unwrap();
        assert!(back.get("total_amount").is_none());
        assert!(back.get("upgrade_price").is_none());
    }

    #[test]
    fn test_supply_ignores_amount_on_unlimited() {
        let mut item = ItemRecord::new(1, 10);
        item.total_amount = Some(3);
        assert_eq!(item.supply(), None);

        let limited = ItemRecord::new(2, 10).limited(3);
        assert_eq!(limited.supply(), Some(3));
    }
}
