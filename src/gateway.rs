//! Wiring: store, bus, link, classifier and router assembled into a
//! running gateway.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::domain::EventBus;
use crate::error::GatewayError;
use crate::link::HardwareLink;
use crate::persistence::SqliteEventStore;
use crate::service::{BroadcastHub, EventClassifier, ShardedDispatcher};

/// A started gateway: the hardware link is supervised and inbound reads
/// flow through the classifier.
#[derive(Debug)]
pub struct Gateway {
    state: AppState,
}

impl Gateway {
    /// Wires every component around `store` and starts the hardware link.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the link cannot be started.
    pub async fn start(config: &GatewayConfig, store: SqliteEventStore) -> Result<Self, GatewayError> {
        let store = Arc::new(store);
        let bus = EventBus::new(config.event_bus_capacity);
        let link = Arc::new(HardwareLink::new(config.link.clone(), bus.clone()));
        let hub = BroadcastHub::new(bus, Arc::clone(&link));
        let classifier = Arc::new(EventClassifier::new(store, hub.clone()));

        let dispatcher = ShardedDispatcher::spawn(Arc::clone(&classifier), config.classifier_workers);
        tracing::info!(workers = dispatcher.workers(), "classification workers started");
        link.start(Arc::new(dispatcher)).await?;

        Ok(Self {
            state: AppState::new(classifier, hub, config.recent_events_limit),
        })
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// HTTP router with tracing, CORS, request timeout and the optional
    /// static frontend.
    #[must_use]
    pub fn router(&self, config: &GatewayConfig) -> Router {
        let mut router = api::build_router();
        if let Some(dir) = &config.static_dir {
            tracing::info!(dir = %dir.display(), "serving static frontend");
            router = router.fallback_service(ServeDir::new(dir));
        }
        router
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        config.request_timeout,
                    )),
            )
            .with_state(self.state.clone())
    }

    /// Stops the hardware link (no further restarts) and closes the store.
    pub async fn shutdown(self) {
        self.state.hub.link().shutdown().await;
        self.state.store.close().await;
        tracing::info!("gateway stopped");
    }
}
