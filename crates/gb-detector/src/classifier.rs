//! Classification of a batch of newly detected items.
//!
//! Two pure steps run before forwarding:
//!
//! 1. [`SkipTally`] counts items per skip reason. The counters are
//!    informational only: they feed the cycle summary and never remove an
//!    item from the batch.
//! 2. [`prioritize`] ranks items by their position in the full listing and,
//!    when the user asks for it, by lowest supply first.

use gb_types::ItemRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Per-cycle counters of new items by skip reason.
///
/// Predicates are independent, so one item can count towards several
/// reasons (e.g. sold out and not upgradable).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipTally {
    pub sold_out: u32,
    pub non_limited: u32,
    /// Only counted when the user requires upgradable items.
    pub non_upgradable: u32,
}

impl SkipTally {
    /// Count one item.
    pub fn record(&mut self, item: &ItemRecord, upgradable_only: bool) {
        self.sold_out += u32::from(item.is_sold_out);
        self.non_limited += u32::from(!item.is_limited);
        self.non_upgradable += u32::from(upgradable_only && !item.is_upgradable());
    }

    /// Tally a whole batch.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ItemRecord>, upgradable_only: bool) -> Self {
        let mut tally = Self::default();
        for item in items {
            tally.record(item, upgradable_only);
        }
        tally
    }

    /// Returns true if every counter is zero.
    pub fn is_empty(&self) -> bool {
        self.sold_out == 0 && self.non_limited == 0 && self.non_upgradable == 0
    }
}

/// A new item together with its rank in the current listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedItem {
    /// 1 = most recently listed.
    pub position: usize,
    pub item: ItemRecord,
}

/// Order a batch of new items for forwarding.
///
/// `listing` is the id order of the *full* current listing, most recent
/// first; positions are ranks within it, not within the batch.
///
/// - Default: by position ascending (most recent first).
/// - `low_supply_first`: by `(supply, position)`, where unlimited items and
///   items with unknown supply sort after every limited item.
pub fn prioritize(
    new_items: Vec<ItemRecord>,
    listing: &[i64],
    low_supply_first: bool,
) -> Vec<PrioritizedItem> {
    let ranks: HashMap<i64, usize> = listing
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| (*id, index + 1))
        .collect();
    let unranked = listing.len() + 1;

    let mut ranked: Vec<PrioritizedItem> = new_items
        .into_iter()
        .map(|item| PrioritizedItem {
            position: ranks.get(&item.id).copied().unwrap_or(unranked),
            item,
        })
        .collect();

    if low_supply_first {
        ranked.sort_by_key(|p| {
            let supply = p.item.supply();
            (supply.is_none(), supply.unwrap_or(0), p.position)
        });
    } else {
        ranked.sort_by_key(|p| p.position);
    }

    ranked
}
