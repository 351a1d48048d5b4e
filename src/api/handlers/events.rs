//! Access log handlers: query, get, manual entry.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EventListResponse, EventQuery, EventWindow, ManualEntryRequest};
use crate::app_state::AppState;
use crate::domain::{AccessEvent, EventId, UserId};
use crate::error::{ErrorResponse, GatewayError};
use crate::persistence::EventStore;

/// `GET /events` — Recent events or a time range.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] on an incomplete or inverted range.
/// - [`GatewayError::StorageFailure`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Query the access log",
    description = "With `limit` (or nothing) returns the newest events first. With `from` and `to` returns the events in that half-open range, oldest first.",
    params(EventQuery),
    responses(
        (status = 200, description = "Events", body = EventListResponse),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<EventListResponse>, GatewayError> {
    let events = match query.window(state.recent_events_limit)? {
        EventWindow::Recent(limit) => state.store.list_recent_events(limit).await?,
        EventWindow::Between(from, to) => state.store.list_events_between(from, to).await?,
    };
    Ok(Json(events.into()))
}

/// `GET /events/{id}` — Get one event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an access event",
    params(
        ("id" = i64, Path, description = "Event ID"),
    ),
    responses(
        (status = 200, description = "Event", body = AccessEvent),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AccessEvent>, GatewayError> {
    state
        .store
        .find_event(EventId::new(id))
        .await?
        .map(Json)
        .ok_or(GatewayError::EventNotFound(id))
}

/// `POST /manual-entry` — Record an operator-initiated entry or exit.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] if `userId` is missing.
/// - [`GatewayError::UserNotFound`] if the user does not exist.
/// - [`GatewayError::StorageFailure`] if the event cannot be persisted.
#[utoipa::path(
    post,
    path = "/api/v1/manual-entry",
    tag = "Events",
    summary = "Manual entry",
    description = "Records a MANUAL, SUCCESS event for the user. The direction follows the same rule as scanned reads. The event is persisted, then broadcast.",
    request_body = ManualEntryRequest,
    responses(
        (status = 201, description = "Event recorded", body = AccessEvent),
        (status = 400, description = "Missing userId", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn manual_entry(
    State(state): State<AppState>,
    Json(req): Json<ManualEntryRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user_id = req
        .user_id
        .ok_or_else(|| GatewayError::InvalidRequest("userId is required".to_string()))?;
    let event = state.classifier.record_manual(UserId::new(user_id)).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Access log routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/{id}", get(get_event))
        .route("/manual-entry", post(manual_entry))
}
