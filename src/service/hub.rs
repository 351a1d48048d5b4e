//! Broadcast hub: real-time fan-out and remote-control relay.
//!
//! [`BroadcastHub`] owns the subscriber registry (the [`EventBus`]) and a
//! handle to the [`HardwareLink`]. Delivery is best-effort multicast to
//! whoever is subscribed at publish time; commands from subscribers are
//! validated here and forwarded verbatim to the link.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::{AccessEvent, EventBus, HubEvent, RemoteAction, RemoteCommand};
use crate::error::GatewayError;
use crate::link::HardwareLink;

/// Subscriber registry plus command relay.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    bus: EventBus,
    link: Arc<HardwareLink>,
}

impl BroadcastHub {
    /// Creates a hub publishing on `bus` and relaying to `link`.
    #[must_use]
    pub fn new(bus: EventBus, link: Arc<HardwareLink>) -> Self {
        Self { bus, link }
    }

    /// Registers a new subscriber. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        let rx = self.bus.subscribe();
        tracing::debug!(subscribers = self.bus.receiver_count(), "subscriber joined");
        rx
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.bus.receiver_count()
    }

    /// Publishes a persisted event to every current subscriber.
    ///
    /// Returns the number of subscribers it was queued for.
    pub fn publish_access_event(&self, event: &AccessEvent) -> usize {
        let delivered = self.bus.publish(HubEvent::AccessEvent {
            event: event.clone(),
        });
        tracing::debug!(event_id = %event.id, delivered, "access event broadcast");
        delivered
    }

    /// The hardware link commands are relayed to.
    #[must_use]
    pub fn link(&self) -> &Arc<HardwareLink> {
        &self.link
    }

    /// Validates a subscriber command and forwards it to the hardware agent.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] / [`GatewayError::UnknownAction`]
    ///   if the command is rejected; it is not forwarded.
    /// - [`GatewayError::LinkUnavailable`] if the agent is not running; the
    ///   command is dropped.
    pub async fn relay_command(
        &self,
        payload: serde_json::Value,
    ) -> Result<RemoteAction, GatewayError> {
        let command = RemoteCommand::parse(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "remote command rejected");
        })?;
        let action = command.action();
        self.link.send(command).await.inspect_err(|e| {
            tracing::warn!(error = %e, action = action.as_str(), "remote command dropped");
        })?;
        tracing::info!(action = action.as_str(), "remote command forwarded");
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::domain::{Direction, EventId, Method, NewAccessEvent, Status, UserId};
    use serde_json::json;

    fn idle_hub() -> BroadcastHub {
        let bus = EventBus::new(64);
        let link = Arc::new(HardwareLink::new(
            LinkConfig::new("true", Vec::new()),
            bus.clone(),
        ));
        BroadcastHub::new(bus, link)
    }

    fn event(id: i64) -> AccessEvent {
        NewAccessEvent::new(
            Some(UserId::new(1)),
            "AB12",
            Direction::In,
            Method::Scanned,
            Status::Success,
            json!({"credentialId": "AB12"}),
        )
        .into_stored(EventId::new(id))
    }

    #[tokio::test]
    async fn all_subscribers_receive_events_in_publish_order() {
        let hub = idle_hub();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        for id in 1..=3 {
            assert_eq!(hub.publish_access_event(&event(id)), 2);
        }

        for rx in [&mut first, &mut second] {
            for expected in 1..=3 {
                let Ok(received) = rx.recv().await else {
                    panic!("subscriber closed");
                };
                assert_eq!(
                    received.access_event().map(|e| e.id),
                    Some(EventId::new(expected))
                );
            }
        }
    }

    #[tokio::test]
    async fn departed_subscriber_does_not_block_others() {
        let hub = idle_hub();
        let gone = hub.subscribe();
        let mut stays = hub.subscribe();
        drop(gone);

        assert_eq!(hub.publish_access_event(&event(1)), 1);
        assert!(stays.recv().await.is_ok());
    }

    #[tokio::test]
    async fn unknown_action_is_rejected_not_forwarded() {
        let hub = idle_hub();
        let result = hub.relay_command(json!({"action": "self_destruct"})).await;
        assert!(matches!(result, Err(GatewayError::UnknownAction(a)) if a == "self_destruct"));
    }

    #[tokio::test]
    async fn command_while_link_down_reports_unavailable() {
        let hub = idle_hub();
        let result = hub.relay_command(json!({"action": "open_door"})).await;
        assert!(matches!(result, Err(GatewayError::LinkUnavailable(_))));
    }
}
