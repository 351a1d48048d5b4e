//! Database row models for users and access events.
//!
//! Timestamps are stored as UTC microseconds so range queries compare
//! integers; enums are stored as their upper-case names.

use chrono::{DateTime, Utc};

use crate::domain::{AccessEvent, EventId, User, UserId};
use crate::error::GatewayError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Unique credential token.
    pub credential_id: String,
    /// Creation time in UTC microseconds.
    pub created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = GatewayError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            credential_id: row.credential_id,
            created_at: from_micros(row.created_at)?,
        })
    }
}

/// A row from the `access_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Resolved user, if any.
    pub user_id: Option<i64>,
    /// Credential as read.
    pub credential_id: String,
    /// `IN` or `OUT`.
    pub direction: String,
    /// `SCANNED` or `MANUAL`.
    pub method: String,
    /// `SUCCESS` or `FAILURE`.
    pub status: String,
    /// Classification time in UTC microseconds.
    pub occurred_at: i64,
    /// Original message as JSON text.
    pub raw_payload: String,
}

impl TryFrom<EventRow> for AccessEvent {
    type Error = GatewayError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let raw_payload = serde_json::from_str(&row.raw_payload)
            .map_err(|e| GatewayError::StorageFailure(format!("corrupt raw_payload: {e}")))?;
        Ok(Self {
            id: EventId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            credential_id: row.credential_id,
            direction: row.direction.parse()?,
            method: row.method.parse()?,
            status: row.status.parse()?,
            timestamp: from_micros(row.occurred_at)?,
            raw_payload,
        })
    }
}

/// Converts a timestamp to its stored form.
#[must_use]
pub fn to_micros(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

/// Converts a stored timestamp back.
///
/// # Errors
///
/// Returns [`GatewayError::StorageFailure`] if the value is out of range.
pub fn from_micros(micros: i64) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| GatewayError::StorageFailure(format!("timestamp out of range: {micros}")))
}
