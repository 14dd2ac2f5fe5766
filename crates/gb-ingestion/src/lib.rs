//! # gb-ingestion
//!
//! Transport layer between the detection engine and the messaging backend.
//!
//! This crate provides a [`Transport`] trait abstracting one user's
//! authenticated session, and a [`TransportFactory`] that opens one such
//! handle per user. The engine never shares a handle across users.
//!
//! ## Design Principles
//!
//! - **Native async traits**: Like the rest of the workspace, the traits use
//!   `impl Future` return types (Rust 1.75+) instead of `async_trait`, so
//!   callers are generic over the transport rather than boxing it.
//!
//! - **Thin wrapper**: [`GatewayTransport`] maps each operation onto one HTTP
//!   call to the session gateway that owns the account session.
//!
//! - **Testable**: [`MockTransport`] and [`MockFactory`] script listings and
//!   failures, and record everything sent, without network calls.
//!
//! ## Testing with MockTransport
//!
//! ```rust
//! use gb_ingestion::{MockTransport, Transport};
//! use gb_types::ItemRecord;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockTransport::new().with_listing(vec![ItemRecord::new(1, 50)]);
//!     mock.connect().await.unwrap();
//!
//!     let items = mock.list_current_items().await.unwrap();
//!     assert_eq!(items.len(), 1);
//! }
//! ```

pub mod config;
pub mod error;
mod gateway;
mod mock;

use std::future::Future;

pub use config::GatewayConfig;
pub use error::TransportError;
pub use gateway::{GatewayFactory, GatewayTransport};
pub use mock::{MockFactory, MockTransport};

use gb_types::{ChannelTarget, ItemRecord, Recipient, UserConfig};

/// One user's session with the messaging backend.
///
/// ## Why `Send + Sync + 'static`?
///
/// A handle is moved into the user's detection task and also used by the
/// orchestrator for shutdown, so it must be shareable across tasks.
pub trait Transport: Send + Sync + 'static {
    /// Returns true if the session is currently usable.
    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the session.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Release the session.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetch every currently listed item.
    ///
    /// Order is recency: the first element is the most recently listed item.
    fn list_current_items(
        &self,
    ) -> impl Future<Output = Result<Vec<ItemRecord>, TransportError>> + Send;

    /// Acquire one unit of `item_id` on behalf of `recipient`.
    fn send_item(
        &self,
        item_id: i64,
        recipient: &Recipient,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Post a text message to a chat.
    fn send_message(
        &self,
        chat: &ChannelTarget,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens per-user transport handles.
///
/// Opening only builds the handle; the orchestrator calls
/// [`Transport::connect`] afterwards.
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: Transport;

    /// Build a handle bound to `config`'s credentials.
    fn open(&self, config: &UserConfig) -> Result<Self::Transport, TransportError>;
}
