//! Broadcast channel for hub events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every persisted
//! access event and every link transition is published through the bus, and
//! each WebSocket connection holds one receiver.

use tokio::sync::broadcast;

use super::HubEvent;

/// Broadcast bus for [`HubEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// All receivers observe the single global publish order. When a receiver
/// falls more than `capacity` events behind, the oldest events are dropped
/// for that receiver only.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: HubEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    ///
    /// Events published before this call are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
