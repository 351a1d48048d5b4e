//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::LinkStatus;
use crate::persistence::EventStore;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Hardware link supervision status.
    pub link: LinkStatus,
    /// Consecutive agent failures.
    pub consecutive_failures: u32,
    /// `ok` or `unreachable`.
    pub storage: String,
}

/// `GET /health` — Service health status.
///
/// Reports `degraded` when the agent has failed too many times in a row or
/// the store cannot be reached.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, hardware link status and store reachability.",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let link = state.hub.link();
    let link_state = link.state().await;
    let link_degraded = link_state.is_degraded(link.degraded_threshold());

    let storage_ok = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "store health check failed");
            false
        }
    };

    let status = if storage_ok && !link_degraded {
        "healthy"
    } else {
        "degraded"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            link: link_state.status,
            consecutive_failures: link_state.consecutive_failures,
            storage: if storage_ok { "ok" } else { "unreachable" }.to_string(),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
