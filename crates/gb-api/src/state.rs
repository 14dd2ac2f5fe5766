//! Application state for the API server.

use gb_orchestrator::Orchestrator;
use gb_ingestion::TransportFactory;

/// Shared application state.
pub struct AppState<F: TransportFactory, S, H> {
    /// The session registry every route operates on.
    pub orchestrator: Orchestrator<F, S, H>,
}

impl<F: TransportFactory, S, H> AppState<F, S, H> {
    /// Create a new application state around an orchestrator.
    pub fn new(orchestrator: Orchestrator<F, S, H>) -> Self {
        Self { orchestrator }
    }
}
