//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! relaying incoming commands and forwarding hub events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsMessage, WsMessageType};
use crate::domain::HubEvent;
use crate::error::GatewayError;
use crate::service::BroadcastHub;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and relays them through the hub.
/// - Forwards every event from the [`broadcast::Receiver`] to the client.
///
/// A client that falls behind skips the overwritten events and receives a
/// `lagged` notice instead. The subscription ends when the socket closes.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<HubEvent>,
    hub: BroadcastHub,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::info!(subscribers = hub.subscriber_count(), "ws client connected");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &hub).await;
                        if ws_tx.send(Message::text(reply.to_json())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                let outgoing = match event {
                    Ok(hub_event) => WsMessage::event(&hub_event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                        WsMessage::lagged(n)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if ws_tx.send(Message::text(outgoing.to_json())).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(event_rx);
    tracing::info!(subscribers = hub.subscriber_count(), "ws client disconnected");
}

/// Handles a text message from the client, returning the reply envelope.
async fn handle_text_message(text: &str, hub: &BroadcastHub) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(
            String::new(),
            &GatewayError::InvalidRequest("malformed JSON".to_string()),
        );
    };

    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(
            msg.id,
            &GatewayError::InvalidRequest("only command messages are accepted".to_string()),
        );
    }

    match hub.relay_command(msg.payload).await {
        Ok(action) => WsMessage::response(
            msg.id,
            serde_json::json!({ "action": action.as_str(), "forwarded": true }),
        ),
        Err(e) => WsMessage::error(msg.id, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::domain::EventBus;
    use crate::link::HardwareLink;
    use std::sync::Arc;

    fn idle_hub() -> BroadcastHub {
        let bus = EventBus::new(16);
        let link = Arc::new(HardwareLink::new(
            LinkConfig::new("true", Vec::new()),
            bus.clone(),
        ));
        BroadcastHub::new(bus, link)
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let reply = handle_text_message("{not json", &idle_hub()).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 1001);
    }

    #[tokio::test]
    async fn non_command_is_rejected() {
        let reply = handle_text_message(
            r#"{"id":"r1","type":"response","payload":{}}"#,
            &idle_hub(),
        )
        .await;
        assert_eq!(reply.id, "r1");
        assert_eq!(reply.msg_type, WsMessageType::Error);
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let reply = handle_text_message(
            r#"{"id":"c1","type":"command","payload":{"action":"launch"}}"#,
            &idle_hub(),
        )
        .await;
        assert_eq!(reply.id, "c1");
        assert_eq!(reply.payload["code"], 1003);
    }

    #[tokio::test]
    async fn command_while_link_down_is_unavailable() {
        let reply = handle_text_message(
            r#"{"id":"c2","type":"command","payload":{"action":"open_door"}}"#,
            &idle_hub(),
        )
        .await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 3002);
    }
}
