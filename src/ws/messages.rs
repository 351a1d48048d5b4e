//! WebSocket message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::HubEvent;
use crate::error::GatewayError;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wraps a hub event for delivery to a subscriber.
    #[must_use]
    pub fn event(event: &HubEvent) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            WsMessageType::Event,
            serde_json::to_value(event).unwrap_or_default(),
        )
    }

    /// Tells a subscriber it fell behind and `missed` events were skipped.
    #[must_use]
    pub fn lagged(missed: u64) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            WsMessageType::Event,
            serde_json::json!({ "event_type": "lagged", "missed": missed }),
        )
    }

    /// Successful reply to the command with the given `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self::new(id, WsMessageType::Response, payload)
    }

    /// Error reply to the command with the given `id`.
    #[must_use]
    pub fn error(id: String, error: &GatewayError) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::to_value(error.to_body()).unwrap_or_default(),
        )
    }

    /// Serializes the envelope for the wire.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
