//! Acquisition of forwarded items.
//!
//! The detection loop hands every new item, one at a time, to the user's
//! [`AcquisitionHandler`]. The handler decides whether to buy and for whom.
//! [`RangeAcquisition`] is the production handler: it runs the range matcher
//! and transfers the matched quantity to the range's recipients.

use gb_ingestion::Transport;
use gb_types::{ItemRecord, UserConfig};
use serde::Serialize;
use std::future::Future;

use crate::error::DispatchError;

/// Why a matched item was not acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SoldOut,
    NonLimited,
    NotUpgradable,
    NoRecipients,
}

/// What the handler did with one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// No range fits the item's price and supply.
    Unmatched,
    /// A range fits but the item cannot or should not be acquired.
    Skipped(SkipReason),
    /// Units were transferred; `failed` counts units the transport refused.
    Acquired { sent: u32, failed: u32 },
}

/// Executes acquisition for one item on behalf of one user.
pub trait AcquisitionHandler: Send + Sync + 'static {
    fn handle<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
        item: &ItemRecord,
    ) -> impl Future<Output = Result<AcquisitionOutcome, DispatchError>> + Send;
}

/// Range-driven acquisition.
///
/// Recipients are assigned round-robin in declaration order: unit `i` of a
/// matched range goes to `recipients[i % recipients.len()]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeAcquisition;

impl RangeAcquisition {
    fn skip_reason(config: &UserConfig, item: &ItemRecord) -> Option<SkipReason> {
        if item.is_sold_out {
            Some(SkipReason::SoldOut)
        } else if !item.is_limited {
            Some(SkipReason::NonLimited)
        } else if config.upgradable_only && !item.is_upgradable() {
            Some(SkipReason::NotUpgradable)
        } else {
            None
        }
    }
}

impl AcquisitionHandler for RangeAcquisition {
    async fn handle<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
        item: &ItemRecord,
    ) -> Result<AcquisitionOutcome, DispatchError> {
        let user_id = config.user_id;
        let hit = config.matching_range(item.price, item.total_amount.unwrap_or(0));
        if !hit.matched {
            tracing::debug!(user_id, item_id = item.id, price = item.price, "No range matches");
            return Ok(AcquisitionOutcome::Unmatched);
        }

        if let Some(reason) = Self::skip_reason(config, item) {
            tracing::info!(user_id, item_id = item.id, ?reason, "Skipping matched gift");
            return Ok(AcquisitionOutcome::Skipped(reason));
        }
        if hit.recipients.is_empty() {
            tracing::warn!(user_id, item_id = item.id, "Matched range has no recipients");
            return Ok(AcquisitionOutcome::Skipped(SkipReason::NoRecipients));
        }

        let mut sent = 0;
        let mut failed = 0;
        let mut last_error = None;

        for (recipient, unit) in hit.recipients.iter().cycle().zip(0..hit.quantity) {
            match transport.send_item(item.id, recipient).await {
                Ok(()) => {
                    sent += 1;
                    tracing::info!(user_id, item_id = item.id, %recipient, unit, "Gift sent");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(user_id, item_id = item.id, %recipient, unit, "Gift send failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if sent == 0 => Err(e.into()),
            _ => Ok(AcquisitionOutcome::Acquired { sent, failed }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_ingestion::MockTransport;
    use gb_types::{parse_ranges_text, RawUserConfig, Recipient};

    fn config(ranges: &str, upgradable_only: bool) -> UserConfig {
        let mut raw = RawUserConfig::new(1);
        raw.purchase_only_upgradable_gifts = upgradable_only;
        let mut config = UserConfig::from_raw(raw).unwrap();
        config.ranges = parse_ranges_text(ranges).unwrap();
        config
    }

    async fn connected() -> MockTransport {
        let transport = MockTransport::new();
        transport.connect().await.unwrap();
        transport
    }

    #[tokio::test]
    async fn test_round_robin_recipients() {
        let transport = connected().await;
        let config = config("1-100:1000:3:@a,@b", false);
        let item = ItemRecord::new(9, 50).limited(100);

        let outcome = RangeAcquisition.handle(&transport, &config, &item).await.unwrap();
        assert_eq!(outcome, AcquisitionOutcome::Acquired { sent: 3, failed: 0 });
        assert_eq!(
            transport.sent(),
            vec![
                (9, Recipient::Username("a".into())),
                (9, Recipient::Username("b".into())),
                (9, Recipient::Username("a".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_unmatched_sends_nothing() {
        let transport = connected().await;
        let config = config("1-100:1000:1:@a", false);

        let outcome = RangeAcquisition
            .handle(&transport, &config, &ItemRecord::new(1, 5000).limited(1))
            .await
            .unwrap();
        assert_eq!(outcome, AcquisitionOutcome::Unmatched);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_matched_but_skipped() {
        let transport = connected().await;
        let strict = config("1-100:1000:1:@a", true);

        let sold_out = ItemRecord::new(1, 50).limited(10).sold_out();
        let unlimited = ItemRecord::new(2, 50);
        let plain = ItemRecord::new(3, 50).limited(10);

        assert_eq!(
            RangeAcquisition.handle(&transport, &strict, &sold_out).await.unwrap(),
            AcquisitionOutcome::Skipped(SkipReason::SoldOut)
        );
        assert_eq!(
            RangeAcquisition.handle(&transport, &strict, &unlimited).await.unwrap(),
            AcquisitionOutcome::Skipped(SkipReason::NonLimited)
        );
        assert_eq!(
            RangeAcquisition.handle(&transport, &strict, &plain).await.unwrap(),
            AcquisitionOutcome::Skipped(SkipReason::NotUpgradable)
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_all_units_failing_is_an_error() {
        let transport = MockTransport::new().with_failing_item(4);
        transport.connect().await.unwrap();
        let config = config("1-100:1000:2:@a", false);

        let result = RangeAcquisition
            .handle(&transport, &config, &ItemRecord::new(4, 50).limited(10))
            .await;
        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }
}
