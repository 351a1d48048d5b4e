//! Hardware link handlers: status and remote commands.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CommandAccepted, LinkStatusResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /link` — Supervision state and diagnostics.
#[utoipa::path(
    get,
    path = "/api/v1/link",
    tag = "Link",
    summary = "Hardware link status",
    responses(
        (status = 200, description = "Link state", body = LinkStatusResponse),
    )
)]
pub async fn link_status(State(state): State<AppState>) -> Json<LinkStatusResponse> {
    let link = state.hub.link();
    let link_state = link.state().await;
    Json(LinkStatusResponse {
        degraded: link_state.is_degraded(link.degraded_threshold()),
        degraded_threshold: link.degraded_threshold(),
        state: link_state,
        diagnostics: link.diagnostics(),
        classifier: state.classifier.stats(),
        subscribers: state.hub.subscriber_count(),
    })
}

/// `POST /link/commands` — Relay a remote-control command to the agent.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] / [`GatewayError::UnknownAction`] if
///   the command is rejected.
/// - [`GatewayError::LinkUnavailable`] if the agent is not running.
#[utoipa::path(
    post,
    path = "/api/v1/link/commands",
    tag = "Link",
    summary = "Send a remote command",
    description = "Forwards `{\"action\": ...}` verbatim to the hardware agent. Recognized actions: open_door, close_door, signal_feedback.",
    request_body = serde_json::Value,
    responses(
        (status = 202, description = "Command forwarded", body = CommandAccepted),
        (status = 400, description = "Invalid or unknown command", body = ErrorResponse),
        (status = 503, description = "Hardware agent not running", body = ErrorResponse),
    )
)]
pub async fn send_command(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let action = state.hub.relay_command(payload).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CommandAccepted {
            action: action.as_str().to_string(),
            forwarded: true,
        }),
    ))
}

/// Hardware link routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/link", get(link_status))
        .route("/link/commands", post(send_command))
}
