//! Access events: the append-only log of credential reads and manual entries.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, UserId};

/// Whether an event represents entry or exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Entry.
    In,
    /// Exit.
    Out,
}

impl Direction {
    /// Decides the direction of the next event given the most recent one.
    ///
    /// Strict toggle on the last event's direction, whatever its status:
    /// `Out` after any `In`, `In` after any `Out` or with no history.
    #[must_use]
    pub fn next_after(last: Option<&AccessEvent>) -> Self {
        match last.map(|event| event.direction) {
            Some(Self::In) => Self::Out,
            Some(Self::Out) | None => Self::In,
        }
    }

    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }
}

/// How the event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read by the hardware agent.
    Scanned,
    /// Recorded by an operator through the API.
    Manual,
}

impl Method {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scanned => "SCANNED",
            Self::Manual => "MANUAL",
        }
    }
}

/// Outcome of the access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Known credential and a good read.
    Success,
    /// Unknown credential or a failed read.
    Failure,
}

impl Status {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl std::str::FromStr for $ty {
            type Err = crate::error::GatewayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(crate::error::GatewayError::StorageFailure(format!(
                        "unexpected {} value: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

impl_from_str!(Direction, "IN" => Direction::In, "OUT" => Direction::Out);
impl_from_str!(Method, "SCANNED" => Method::Scanned, "MANUAL" => Method::Manual);
impl_from_str!(Status, "SUCCESS" => Status::Success, "FAILURE" => Status::Failure);

/// A persisted access event.
///
/// Never mutated or deleted once appended. `user_id` is `None` when the
/// credential did not resolve, and then `status` is always
/// [`Status::Failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessEvent {
    /// Store-assigned identifier.
    pub id: EventId,
    /// Resolved user, if any.
    pub user_id: Option<UserId>,
    /// Credential as read (or the user's credential for manual entries).
    pub credential_id: String,
    /// Entry or exit.
    pub direction: Direction,
    /// Scanned or manual.
    pub method: Method,
    /// Success or failure.
    pub status: Status,
    /// Classification time.
    pub timestamp: DateTime<Utc>,
    /// Original message, kept for diagnostics.
    #[schema(value_type = Object)]
    pub raw_payload: serde_json::Value,
}

/// An access event that has been classified but not yet appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessEvent {
    user_id: Option<UserId>,
    credential_id: String,
    direction: Direction,
    method: Method,
    status: Status,
    timestamp: DateTime<Utc>,
    raw_payload: serde_json::Value,
}

impl NewAccessEvent {
    /// Builds an event stamped with the current time, at the microsecond
    /// precision the store keeps.
    ///
    /// An unresolved credential is always a failure: `status` is forced to
    /// [`Status::Failure`] when `user_id` is `None`.
    #[must_use]
    pub fn new(
        user_id: Option<UserId>,
        credential_id: impl Into<String>,
        direction: Direction,
        method: Method,
        status: Status,
        raw_payload: serde_json::Value,
    ) -> Self {
        let status = if user_id.is_some() {
            status
        } else {
            Status::Failure
        };
        Self {
            user_id,
            credential_id: credential_id.into(),
            direction,
            method,
            status,
            timestamp: Utc::now().trunc_subsecs(6),
            raw_payload,
        }
    }

    /// Resolved user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Credential as read.
    #[must_use]
    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    /// Entry or exit.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Scanned or manual.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Success or failure.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Classification time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Original message.
    #[must_use]
    pub const fn raw_payload(&self) -> &serde_json::Value {
        &self.raw_payload
    }

    /// Attaches the store-assigned ID, producing the persisted form.
    #[must_use]
    pub fn into_stored(self, id: EventId) -> AccessEvent {
        AccessEvent {
            id,
            user_id: self.user_id,
            credential_id: self.credential_id,
            direction: self.direction,
            method: self.method,
            status: self.status,
            timestamp: self.timestamp,
            raw_payload: self.raw_payload,
        }
    }
}

/// Key used to look up the most recent event of a person or card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSubject {
    /// Events attributed to a known user.
    User(UserId),
    /// Events for a credential, resolved or not.
    Credential(String),
}
