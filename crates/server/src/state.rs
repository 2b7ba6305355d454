use std::sync::Arc;

use event_store::EventStore;

use crate::orchestrator::RecommendationOrchestrator;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,

    pub orchestrator: RecommendationOrchestrator,
}

impl AppState {
    pub fn new(store: Arc<EventStore>, orchestrator: RecommendationOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }
}
