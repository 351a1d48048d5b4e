//! Access event queries and manual entry.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayError;

/// Largest page `GET /api/v1/events` will return.
pub const MAX_EVENTS_LIMIT: u32 = 500;

/// Query parameters for `GET /api/v1/events`.
///
/// Either `limit` (recent events) or both `from` and `to` (time range).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    /// Number of recent events (1-500). Defaults to the server setting.
    pub limit: Option<u32>,
    /// Inclusive lower bound (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound (RFC 3339).
    pub to: Option<DateTime<Utc>>,
}

/// The two shapes an [`EventQuery`] can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventWindow {
    /// Newest `n` events.
    Recent(u32),
    /// Events in `[from, to)`, oldest first.
    Between(DateTime<Utc>, DateTime<Utc>),
}

impl EventQuery {
    /// Resolves the query, using `default_limit` when nothing is given.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRequest`] if only one bound is given or the
    /// range is inverted.
    pub fn window(&self, default_limit: u32) -> Result<EventWindow, GatewayError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from <= to => Ok(EventWindow::Between(from, to)),
            (Some(_), Some(_)) => Err(GatewayError::InvalidRequest(
                "`from` must not be after `to`".to_string(),
            )),
            (None, None) => Ok(EventWindow::Recent(
                self.limit
                    .unwrap_or(default_limit)
                    .clamp(1, MAX_EVENTS_LIMIT),
            )),
            _ => Err(GatewayError::InvalidRequest(
                "`from` and `to` must be given together".to_string(),
            )),
        }
    }
}

/// Request body for `POST /api/v1/manual-entry`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryRequest {
    /// User to record the entry or exit for.
    pub user_id: Option<i64>,
}
