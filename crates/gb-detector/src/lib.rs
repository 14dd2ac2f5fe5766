//! # gb-detector
//!
//! The per-user detection pipeline: poll the current listing, diff it against
//! the stored history, classify and order the new items, forward them one by
//! one to the acquisition handler, then replace the history.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   listing   ┌───────────────┐  new items  ┌──────────────┐
//! │ Transport │ ──────────► │ DetectionLoop │ ──────────► │ Acquisition  │
//! └───────────┘             │  (per user)   │             │   Handler    │
//!                           └───────┬───────┘             └──────────────┘
//!                                   │ snapshot
//!                                   ▼
//!                           ┌───────────────┐
//!                           │ HistoryStore  │
//!                           └───────────────┘
//! ```
//!
//! The collaborators are traits so the loop can run against the HTTP gateway
//! and file-backed history in production, and against the in-memory versions
//! in tests.
//!
//! ## Example
//!
//! ```rust
//! use gb_detector::{DetectionLoop, MemoryHistoryStore, RangeAcquisition, TransportNotifier};
//! use gb_ingestion::MockTransport;
//! use gb_types::{ItemRecord, RawUserConfig, UserConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = UserConfig::from_raw(RawUserConfig::new(1)).unwrap();
//!     let transport = MockTransport::new().with_listing(vec![ItemRecord::new(10, 50)]);
//!
//!     let mut detector = DetectionLoop::new(
//!         Arc::new(config),
//!         Arc::new(transport),
//!         Arc::new(MemoryHistoryStore::new()),
//!         Arc::new(TransportNotifier),
//!         Arc::new(RangeAcquisition),
//!     );
//!
//!     let report = detector.run_cycle().await.unwrap();
//!     assert_eq!(report.forwarded, vec![10]);
//! }
//! ```

pub mod acquisition;
pub mod classifier;
pub mod detection;
pub mod error;
pub mod history;
pub mod notify;

pub use acquisition::{AcquisitionHandler, AcquisitionOutcome, RangeAcquisition, SkipReason};
pub use classifier::{prioritize, PrioritizedItem, SkipTally};
pub use detection::{panic_message, CycleReport, DetectionLoop, LoopPhase, LoopStatus};
pub use error::{DispatchError, PersistenceError};
pub use history::{HistorySnapshot, HistoryStore, JsonHistoryStore, MemoryHistoryStore};
pub use notify::{NotificationSink, TransportNotifier};
