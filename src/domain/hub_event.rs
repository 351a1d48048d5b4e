//! Events published to real-time subscribers.
//!
//! Every persisted access event and every hardware link transition is
//! published as a [`HubEvent`] through the [`super::EventBus`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AccessEvent, LinkState};

/// Payload multicast to every connected subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum HubEvent {
    /// A classified access event, already persisted.
    AccessEvent {
        /// The stored event.
        event: AccessEvent,
    },

    /// The hardware link changed status.
    LinkStatus {
        /// Snapshot after the transition.
        state: LinkState,
        /// Transition time.
        timestamp: DateTime<Utc>,
    },
}

impl HubEvent {
    /// Returns the event type as a snake_case string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::AccessEvent { .. } => "access_event",
            Self::LinkStatus { .. } => "link_status",
        }
    }

    /// Returns the access event carried by this message, if any.
    #[must_use]
    pub const fn access_event(&self) -> Option<&AccessEvent> {
        match self {
            Self::AccessEvent { event } => Some(event),
            Self::LinkStatus { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, EventId, LinkStatus, Method, NewAccessEvent, Status, UserId};

    #[test]
    fn access_event_is_tagged() {
        let event = NewAccessEvent::new(
            Some(UserId::new(1)),
            "AB12",
            Direction::In,
            Method::Scanned,
            Status::Success,
            serde_json::json!({"credentialId": "AB12"}),
        )
        .into_stored(EventId::new(10));
        let hub_event = HubEvent::AccessEvent { event };

        let json = serde_json::to_value(&hub_event).unwrap_or_default();
        assert_eq!(json["event_type"], "access_event");
        assert_eq!(json["event"]["id"], 10);
        assert_eq!(hub_event.event_type_str(), "access_event");
        assert!(hub_event.access_event().is_some());
    }

    #[test]
    fn link_status_is_tagged() {
        let hub_event = HubEvent::LinkStatus {
            state: LinkState {
                status: LinkStatus::Running,
                ..LinkState::default()
            },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&hub_event).unwrap_or_default();
        assert_eq!(json["event_type"], "link_status");
        assert_eq!(json["state"]["status"], "RUNNING");
        assert!(hub_event.access_event().is_none());
    }
}
