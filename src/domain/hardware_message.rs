//! Messages exchanged with the hardware agent.
//!
//! Inbound: one JSON object per read, `{credentialId?, success?, ...}`.
//! The agent's older field names (`scanned_uid`, `method`) are accepted too.
//! Outbound: a [`RemoteCommand`], `{action, ...}`, forwarded verbatim.

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Which reader produced an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReadKind {
    /// RFID card or badge.
    Rfid,
    /// Keypad code.
    Keypad,
    /// Anything the agent labels differently.
    Other,
}

impl ReadKind {
    fn parse(label: &str) -> Self {
        if label.eq_ignore_ascii_case("rfid") {
            Self::Rfid
        } else if label.eq_ignore_ascii_case("keypad") {
            Self::Keypad
        } else {
            Self::Other
        }
    }
}

/// One parsed inbound line from the hardware agent.
///
/// Lives for a single IPC round trip; the raw object is kept so the
/// classifier can store it as the event's diagnostic payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareMessage {
    kind: ReadKind,
    credential_id: Option<String>,
    success: Option<bool>,
    raw: serde_json::Value,
}

impl HardwareMessage {
    /// Interprets a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedEvent`] if the value is not a JSON
    /// object. A missing credential is *not* an error here; the classifier
    /// rejects it so the rejection is counted in one place.
    pub fn from_value(raw: serde_json::Value) -> Result<Self, GatewayError> {
        let Some(fields) = raw.as_object() else {
            return Err(GatewayError::MalformedEvent(
                "expected a JSON object".to_string(),
            ));
        };

        let credential_id = fields
            .get("credentialId")
            .or_else(|| fields.get("scanned_uid"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let success = match fields.get("success") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Bool(flag)) => Some(*flag),
            // Never grant access on a flag we cannot read.
            Some(_) => Some(false),
        };
        let kind = fields
            .get("kind")
            .or_else(|| fields.get("method"))
            .and_then(|v| v.as_str())
            .map_or(ReadKind::Rfid, ReadKind::parse);

        Ok(Self {
            kind,
            credential_id,
            success,
            raw,
        })
    }

    /// Reader that produced the message.
    #[must_use]
    pub const fn kind(&self) -> ReadKind {
        self.kind
    }

    /// Credential token, if the message carried a non-empty one.
    #[must_use]
    pub fn credential_id(&self) -> Option<&str> {
        self.credential_id.as_deref()
    }

    /// Whether the agent reported a good read. An absent or `null` flag
    /// counts as a good read; `false` or a non-boolean value is a failed one.
    #[must_use]
    pub fn read_succeeded(&self) -> bool {
        self.success.unwrap_or(true)
    }

    /// The original JSON object.
    #[must_use]
    pub const fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// Consumes the message, returning the original JSON object.
    #[must_use]
    pub fn into_raw(self) -> serde_json::Value {
        self.raw
    }
}

/// Actuator actions the hardware agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemoteAction {
    /// Drive the servo to open the door.
    OpenDoor,
    /// Drive the servo to close the door.
    CloseDoor,
    /// Flash the LED / sound the buzzer.
    SignalFeedback,
}

impl RemoteAction {
    /// Every recognized action.
    pub const ALL: [Self; 3] = [Self::OpenDoor, Self::CloseDoor, Self::SignalFeedback];

    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenDoor => "open_door",
            Self::CloseDoor => "close_door",
            Self::SignalFeedback => "signal_feedback",
        }
    }

    /// Looks up an action by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

/// A validated remote-control command, forwarded to the agent verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommand {
    action: RemoteAction,
    payload: serde_json::Value,
}

impl RemoteCommand {
    /// Validates the shape of a command received from a subscriber.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if the value is not an object or
    ///   has no string `action` field.
    /// - [`GatewayError::UnknownAction`] if `action` is not recognized.
    pub fn parse(payload: serde_json::Value) -> Result<Self, GatewayError> {
        let action = payload
            .as_object()
            .ok_or_else(|| GatewayError::InvalidRequest("command must be a JSON object".to_string()))?
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GatewayError::InvalidRequest("command requires a string `action`".to_string())
            })?;
        let action = RemoteAction::from_name(action)
            .ok_or_else(|| GatewayError::UnknownAction(action.to_string()))?;
        Ok(Self { action, payload })
    }

    /// The recognized action.
    #[must_use]
    pub const fn action(&self) -> RemoteAction {
        self.action
    }

    /// The command exactly as received.
    #[must_use]
    pub const fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_current_field_names() {
        let Ok(msg) = HardwareMessage::from_value(json!({"credentialId": "AB12", "success": false}))
        else {
            panic!("valid message rejected");
        };
        assert_eq!(msg.credential_id(), Some("AB12"));
        assert!(!msg.read_succeeded());
        assert_eq!(msg.kind(), ReadKind::Rfid);
    }

    #[test]
    fn accepts_agent_legacy_fields() {
        let Ok(msg) =
            HardwareMessage::from_value(json!({"method": "KEYPAD", "scanned_uid": "4821"}))
        else {
            panic!("legacy message rejected");
        };
        assert_eq!(msg.credential_id(), Some("4821"));
        assert_eq!(msg.kind(), ReadKind::Keypad);
        assert!(msg.read_succeeded());
    }

    #[test]
    fn non_boolean_success_is_a_failed_read() {
        for flag in [json!("false"), json!("true"), json!(0), json!(1), json!({})] {
            let Ok(msg) =
                HardwareMessage::from_value(json!({"credentialId": "AB12", "success": flag}))
            else {
                panic!("object rejected");
            };
            assert!(!msg.read_succeeded(), "success = {flag}");
        }
    }

    #[test]
    fn null_success_counts_as_absent() {
        let Ok(msg) = HardwareMessage::from_value(json!({"credentialId": "AB12", "success": null}))
        else {
            panic!("object rejected");
        };
        assert!(msg.read_succeeded());
    }

    #[test]
    fn blank_credential_is_missing() {
        let Ok(msg) = HardwareMessage::from_value(json!({"credentialId": "  "})) else {
            panic!("object rejected");
        };
        assert!(msg.credential_id().is_none());
    }

    #[test]
    fn non_object_is_malformed() {
        let result = HardwareMessage::from_value(json!([1, 2, 3]));
        assert!(matches!(result, Err(GatewayError::MalformedEvent(_))));
    }

    #[test]
    fn command_keeps_payload_verbatim() {
        let payload = json!({"action": "open_door", "durationMs": 1500});
        let Ok(cmd) = RemoteCommand::parse(payload.clone()) else {
            panic!("valid command rejected");
        };
        assert_eq!(cmd.action(), RemoteAction::OpenDoor);
        assert_eq!(cmd.payload(), &payload);
    }

    #[test]
    fn command_rejects_unknown_and_missing_actions() {
        assert!(matches!(
            RemoteCommand::parse(json!({"action": "self_destruct"})),
            Err(GatewayError::UnknownAction(_))
        ));
        assert!(matches!(
            RemoteCommand::parse(json!({"door": "open"})),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            RemoteCommand::parse(json!("open_door")),
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
