//! # gb-orchestrator
//!
//! Runs one detection loop per authorized user and keeps them apart.
//!
//! - [`Orchestrator`] - the user → session registry with start, stop,
//!   restart, bulk start/stop and read-only queries
//! - [`UserSession`] - one user's config, transport handle and loop task
//! - [`ConfigStore`] - where user configuration comes from, with a JSON file
//!   implementation and an in-memory one for tests
//!
//! A panic or error inside one user's loop is contained in that user's task;
//! lifecycle calls for one user never fail because of another.
//!
//! ## Example
//!
//! ```rust
//! use gb_detector::MemoryHistoryStore;
//! use gb_ingestion::MockFactory;
//! use gb_orchestrator::{MemoryConfigStore, Orchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Orchestrator::new(
//!         MockFactory::new(),
//!         Arc::new(MemoryConfigStore::new()),
//!         Arc::new(MemoryHistoryStore::new()),
//!     );
//!
//!     // Stopping a user that is not running is a no-op.
//!     assert!(!orchestrator.stop(42).await);
//!     assert_eq!(orchestrator.active_count().await, 0);
//! }
//! ```

pub mod error;
mod orchestrator;
mod session;
pub mod store;

pub use error::{OrchestratorError, StoreError};
pub use orchestrator::{Orchestrator, StartStatus, RESTART_DELAY};
pub use session::{SessionSummary, UserSession};
pub use store::{ConfigStore, JsonConfigStore, MemoryConfigStore};
