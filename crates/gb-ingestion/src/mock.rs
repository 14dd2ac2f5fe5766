//! Mock transport for testing.
//!
//! `MockTransport` implements `Transport` with scripted listings and
//! failures. Clones share state, so a test can keep one clone for
//! assertions after handing another to the detection loop.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gb_ingestion::{MockTransport, Transport};
//!
//! let mock = MockTransport::new()
//!     .with_listing(vec![/* first poll */])
//!     .then_listing(vec![/* every later poll */]);
//!
//! let items = mock.list_current_items().await?;
//! ```

use gb_types::{ChannelTarget, ItemRecord, Recipient, UserConfig, UserId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::{error::TransportError, Transport, TransportFactory};

/// Latch that parks an operation until the test opens it. Stays open.
#[derive(Clone)]
struct Gate(Arc<watch::Sender<bool>>);

impl Gate {
    fn closed() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }

    fn open(&self) {
        self.0.send_replace(true);
    }

    async fn pass(&self) {
        let mut open = self.0.subscribe();
        // The sender lives in `self`, so this only returns once opened.
        let _ = open.wait_for(|open| *open).await;
    }
}

#[derive(Default)]
struct MockState {
    /// Listings returned in order; the last one repeats once the rest are used.
    listings: VecDeque<Result<Vec<ItemRecord>, TransportError>>,
    connected: bool,
    connect_failures: u32,
    fail_disconnect: bool,
    panic_on_list: bool,
    connect_gate: Option<Gate>,
    list_gate: Option<Gate>,
    failing_items: HashSet<i64>,
    connect_calls: u32,
    disconnect_calls: u32,
    list_calls: u32,
    sent: Vec<(i64, Recipient)>,
    messages: Vec<(ChannelTarget, String)>,
}

/// Mock transport for testing.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock with no listings configured.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens in panic tests; the
        // data is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a listing (builder pattern).
    pub fn with_listing(self, items: Vec<ItemRecord>) -> Self {
        self.state().listings.push_back(Ok(items));
        self
    }

    /// Alias of [`with_listing`](Self::with_listing) that reads better in sequences.
    pub fn then_listing(self, items: Vec<ItemRecord>) -> Self {
        self.with_listing(items)
    }

    /// Queue a failing listing.
    pub fn then_listing_error(self, error: TransportError) -> Self {
        self.state().listings.push_back(Err(error));
        self
    }

    /// Fail the next `n` connect attempts.
    pub fn with_connect_failures(self, n: u32) -> Self {
        self.state().connect_failures = n;
        self
    }

    /// Make `disconnect` fail (after marking the handle disconnected).
    pub fn with_failing_disconnect(self) -> Self {
        self.state().fail_disconnect = true;
        self
    }

    /// Make `send_item` fail for this item id.
    pub fn with_failing_item(self, item_id: i64) -> Self {
        self.state().failing_items.insert(item_id);
        self
    }

    /// Panic inside `list_current_items`.
    pub fn with_panic_on_list(self) -> Self {
        self.state().panic_on_list = true;
        self
    }

    /// Park every `connect` until [`open_connect_gate`](Self::open_connect_gate).
    ///
    /// The call is counted before it parks.
    pub fn with_connect_gate(self) -> Self {
        self.state().connect_gate = Some(Gate::closed());
        self
    }

    /// Park every `list_current_items` until [`open_list_gate`](Self::open_list_gate).
    ///
    /// The call is counted before it parks.
    pub fn with_list_gate(self) -> Self {
        self.state().list_gate = Some(Gate::closed());
        self
    }

    pub fn open_connect_gate(&self) {
        if let Some(gate) = &self.state().connect_gate {
            gate.open();
        }
    }

    pub fn open_list_gate(&self) {
        if let Some(gate) = &self.state().list_gate {
            gate.open();
        }
    }

    /// Drop the connection, as if the backend closed it.
    pub fn drop_connection(&self) {
        self.state().connected = false;
    }

    /// Items acquired so far, in call order.
    pub fn sent(&self) -> Vec<(i64, Recipient)> {
        self.state().sent.clone()
    }

    /// Messages posted so far, in call order.
    pub fn messages(&self) -> Vec<(ChannelTarget, String)> {
        self.state().messages.clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.state().connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state().disconnect_calls
    }

    pub fn list_calls(&self) -> u32 {
        self.state().list_calls
    }
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let gate = {
            let mut state = self.state();
            state.connect_calls += 1;
            state.connect_gate.clone()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut state = self.state();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(TransportError::Network("mock connect failure".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.disconnect_calls += 1;
        state.connected = false;
        if state.fail_disconnect {
            return Err(TransportError::Network("mock disconnect failure".into()));
        }
        Ok(())
    }

    async fn list_current_items(&self) -> Result<Vec<ItemRecord>, TransportError> {
        let gate = {
            let mut state = self.state();
            state.list_calls += 1;
            state.list_gate.clone()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut state = self.state();

        if state.panic_on_list {
            drop(state);
            panic!("mock listing panic");
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }

        let result = match state.listings.len() {
            0 => Err(TransportError::NoData("mock listing not configured".into())),
            1 => state.listings[0].clone(),
            _ => state
                .listings
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::NoData("mock listing exhausted".into()))),
        };
        // Same contract as the gateway: a lost session needs a reconnect.
        if matches!(&result, Err(e) if e.is_session_lost()) {
            state.connected = false;
        }
        result
    }

    async fn send_item(&self, item_id: i64, recipient: &Recipient) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.failing_items.contains(&item_id) {
            return Err(TransportError::Rejected {
                status: 400,
                body: format!("mock refused item {}", item_id),
            });
        }
        state.sent.push((item_id, recipient.clone()));
        Ok(())
    }

    async fn send_message(&self, chat: &ChannelTarget, text: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.messages.push((chat.clone(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct FactoryState {
    transports: HashMap<UserId, MockTransport>,
    failing_users: HashSet<UserId>,
    opened: Vec<UserId>,
}

/// Factory handing out pre-registered [`MockTransport`]s.
///
/// Users without a registered transport get a fresh, empty mock.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand out `transport` (a shared clone) whenever `user_id` is opened.
    pub fn with_transport(self, user_id: UserId, transport: MockTransport) -> Self {
        self.state().transports.insert(user_id, transport);
        self
    }

    /// Make `open` fail for `user_id`.
    pub fn with_failing_user(self, user_id: UserId) -> Self {
        self.state().failing_users.insert(user_id);
        self
    }

    /// Users opened so far, in call order.
    pub fn opened(&self) -> Vec<UserId> {
        self.state().opened.clone()
    }
}

impl TransportFactory for MockFactory {
    type Transport = MockTransport;

    fn open(&self, config: &UserConfig) -> Result<MockTransport, TransportError> {
        let mut state = self.state();
        state.opened.push(config.user_id);

        if state.failing_users.contains(&config.user_id) {
            return Err(TransportError::Config(format!(
                "mock refused to open user {}",
                config.user_id
            )));
        }

        Ok(state
            .transports
            .entry(config.user_id)
            .or_default()
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_connection() {
        let mock = MockTransport::new().with_listing(vec![ItemRecord::new(1, 5)]);
        assert!(matches!(
            mock.list_current_items().await,
            Err(TransportError::NotConnected)
        ));

        mock.connect().await.unwrap();
        assert_eq!(mock.list_current_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_sequence_repeats_last() {
        let mock = MockTransport::new()
            .with_listing(vec![ItemRecord::new(1, 5)])
            .then_listing(vec![ItemRecord::new(1, 5), ItemRecord::new(2, 5)]);
        mock.connect().await.unwrap();

        assert_eq!(mock.list_current_items().await.unwrap().len(), 1);
        assert_eq!(mock.list_current_items().await.unwrap().len(), 2);
        assert_eq!(mock.list_current_items().await.unwrap().len(), 2);
        assert_eq!(mock.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_connect_failures() {
        let mock = MockTransport::new().with_connect_failures(1);
        assert!(mock.connect().await.is_err());
        assert!(mock.connect().await.is_ok());
        assert!(mock.is_connected());
        assert_eq!(mock.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_session_lost_listing_disconnects() {
        let mock = MockTransport::new()
            .then_listing_error(TransportError::Rejected {
                status: 404,
                body: "session not found".into(),
            })
            .then_listing(vec![ItemRecord::new(1, 5)]);
        mock.connect().await.unwrap();

        assert!(mock.list_current_items().await.is_err());
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn test_connect_gate_parks_until_opened() {
        let mock = MockTransport::new().with_connect_gate();
        let parked = tokio::spawn({
            let mock = mock.clone();
            async move { mock.connect().await }
        });

        while mock.connect_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!mock.is_connected());

        mock.open_connect_gate();
        parked.await.unwrap().unwrap();
        assert!(mock.is_connected());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mock = MockTransport::new();
        let observer = mock.clone();
        mock.connect().await.unwrap();
        mock.send_item(9, &Recipient::Id(1)).await.unwrap();
        assert_eq!(observer.sent(), vec![(9, Recipient::Id(1))]);
    }
}
