//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! The same values travel through the ingestion pipeline, where they are
//! logged instead of rendered.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3002,
///     "message": "hardware link unavailable: process is crashed",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server / Link   | 500 / 503                    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Inbound hardware message was unparsable or incomplete.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Remote-control command carried an unrecognized `action`.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// User with the given ID was not found.
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// Access event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(i64),

    /// Credential is already assigned to another user.
    #[error("credential already registered: {0}")]
    CredentialConflict(String),

    /// Outbound command attempted while the hardware agent is not running.
    #[error("hardware link unavailable: {0}")]
    LinkUnavailable(String),

    /// Persistence layer failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedEvent(_) => 1002,
            Self::UnknownAction(_) => 1003,
            Self::UserNotFound(_) => 2001,
            Self::EventNotFound(_) => 2002,
            Self::CredentialConflict(_) => 2003,
            Self::Internal(_) => 3000,
            Self::StorageFailure(_) => 3001,
            Self::LinkUnavailable(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MalformedEvent(_) | Self::UnknownAction(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound(_) | Self::EventNotFound(_) => StatusCode::NOT_FOUND,
            Self::CredentialConflict(_) => StatusCode::CONFLICT,
            Self::LinkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::StorageFailure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON body shared by REST responses and WebSocket errors.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
            details: None,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for GatewayError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StorageFailure(format!("migration failed: {err}"))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_body(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
