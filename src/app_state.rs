//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::SqliteEventStore;
use crate::service::{BroadcastHub, EventClassifier};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event store for directory and log queries.
    pub store: Arc<SqliteEventStore>,
    /// Classifier for the manual-entry path.
    pub classifier: Arc<EventClassifier<SqliteEventStore>>,
    /// Subscriber registry, command relay and link handle.
    pub hub: BroadcastHub,
    /// Default page size for `GET /api/v1/events`.
    pub recent_events_limit: u32,
}

impl AppState {
    /// Builds state around the classifier that also serves the hardware
    /// path, so manual entries and reads share its credential locks.
    #[must_use]
    pub fn new(
        classifier: Arc<EventClassifier<SqliteEventStore>>,
        hub: BroadcastHub,
        recent_events_limit: u32,
    ) -> Self {
        Self {
            store: Arc::clone(classifier.store()),
            classifier,
            hub,
            recent_events_limit,
        }
    }
}
