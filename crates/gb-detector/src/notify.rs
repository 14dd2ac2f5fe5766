//! Outbound notifications.
//!
//! The loop emits two kinds: a start notice when a user's session comes up,
//! and one summary per cycle that found new items. Delivery goes through the
//! user's own transport handle to the configured channel.

use gb_ingestion::Transport;
use gb_types::UserConfig;
use std::future::Future;

use crate::classifier::SkipTally;
use crate::error::DispatchError;

/// Where start and summary notifications go.
pub trait NotificationSink: Send + Sync + 'static {
    /// Announce that monitoring started for this user.
    fn send_start<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;

    /// Report one cycle's skip counters.
    fn send_summary<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
        tally: &SkipTally,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Posts plain one-line messages to the user's notification channel.
///
/// Users without a channel get nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportNotifier;

impl TransportNotifier {
    pub fn start_text(config: &UserConfig) -> String {
        format!(
            "Gift monitoring started, checking every {}s with {} range(s).",
            config.interval_secs,
            config.ranges.len()
        )
    }

    pub fn summary_text(tally: &SkipTally) -> String {
        format!(
            "New gifts processed. Skipped: {} sold out, {} non-limited, {} non-upgradable.",
            tally.sold_out, tally.non_limited, tally.non_upgradable
        )
    }

    async fn post<T: Transport>(
        transport: &T,
        config: &UserConfig,
        text: String,
    ) -> Result<(), DispatchError> {
        let Some(channel) = &config.channel else {
            tracing::debug!(user_id = config.user_id, "No notification channel, skipping");
            return Ok(());
        };
        transport.send_message(channel, &text).await?;
        Ok(())
    }
}

impl NotificationSink for TransportNotifier {
    async fn send_start<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
    ) -> Result<(), DispatchError> {
        Self::post(transport, config, Self::start_text(config)).await
    }

    async fn send_summary<T: Transport>(
        &self,
        transport: &T,
        config: &UserConfig,
        tally: &SkipTally,
    ) -> Result<(), DispatchError> {
        Self::post(transport, config, Self::summary_text(tally)).await
    }
}
