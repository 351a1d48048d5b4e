//! Event classifier: one hardware message in, one persisted event out.
//!
//! For every message the classifier resolves the credential, decides the
//! direction from the most recent event, decides the status, appends the
//! event to the store and only then publishes it through the hub. The
//! whole sequence holds the credential's lock, so reads of the same card
//! are classified strictly one after another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

use super::BroadcastHub;
use crate::domain::{
    AccessEvent, CredentialLocks, Direction, EventSubject, HardwareMessage, Method,
    NewAccessEvent, Status, UserId,
};
use crate::error::GatewayError;
use crate::persistence::EventStore;

/// Diagnostic tallies of rejected and dropped input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierStats {
    /// Messages rejected for lacking a credential.
    pub malformed_events: u64,
    /// Events dropped because they could not be persisted.
    pub dropped_events: u64,
}

/// Deterministic classifier for hardware reads and manual entries.
#[derive(Debug)]
pub struct EventClassifier<S> {
    store: Arc<S>,
    hub: BroadcastHub,
    locks: CredentialLocks,
    malformed_events: AtomicU64,
    dropped_events: AtomicU64,
}

impl<S: EventStore> EventClassifier<S> {
    /// Creates a classifier persisting to `store` and publishing on `hub`.
    #[must_use]
    pub fn new(store: Arc<S>, hub: BroadcastHub) -> Self {
        Self {
            store,
            hub,
            locks: CredentialLocks::new(),
            malformed_events: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// The store events are persisted to.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rejection and drop counters.
    #[must_use]
    pub fn stats(&self) -> ClassifierStats {
        ClassifierStats {
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }

    /// Classifies one hardware read.
    ///
    /// Status is SUCCESS only when the credential resolves to a user and the
    /// agent reported a good read.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MalformedEvent`] if the message has no credential;
    ///   nothing is persisted or published.
    /// - [`GatewayError::StorageFailure`] if the user lookup or the append
    ///   fails; the event is not published.
    pub async fn classify(&self, message: HardwareMessage) -> Result<AccessEvent, GatewayError> {
        let Some(credential) = message.credential_id().map(str::to_string) else {
            let total = self
                .malformed_events
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1);
            tracing::warn!(malformed_events = total, raw = %message.raw(), "read without credential rejected");
            return Err(GatewayError::MalformedEvent(
                "message has no credentialId".to_string(),
            ));
        };

        let _guard = self.locks.acquire(&credential).await;

        let user = self
            .store
            .find_user_by_credential(&credential)
            .await
            .inspect_err(|e| self.record_drop(&credential, e))?;
        let subject = user.as_ref().map_or_else(
            || EventSubject::Credential(credential.clone()),
            |u| EventSubject::User(u.id),
        );
        let direction = Direction::next_after(self.last_event(&subject).await.as_ref());
        let status = if user.is_some() && message.read_succeeded() {
            Status::Success
        } else {
            Status::Failure
        };

        let event = NewAccessEvent::new(
            user.map(|u| u.id),
            credential,
            direction,
            Method::Scanned,
            status,
            message.into_raw(),
        );
        self.commit(event).await
    }

    /// Records an operator-initiated entry or exit for a known user.
    ///
    /// Produces the same output contract as a scan: persisted, then
    /// published, with the direction decided by the same rule.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UserNotFound`] if the user does not exist.
    /// - [`GatewayError::StorageFailure`] if persistence fails.
    pub async fn record_manual(&self, user_id: UserId) -> Result<AccessEvent, GatewayError> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(GatewayError::UserNotFound(user_id.get()))?;

        let _guard = self.locks.acquire(&user.credential_id).await;

        let direction =
            Direction::next_after(self.last_event(&EventSubject::User(user.id)).await.as_ref());
        let event = NewAccessEvent::new(
            Some(user.id),
            user.credential_id.clone(),
            direction,
            Method::Manual,
            Status::Success,
            serde_json::json!({ "source": "manual", "userId": user.id }),
        );
        self.commit(event).await
    }

    /// Most recent event, or `None` when it cannot be determined.
    async fn last_event(&self, subject: &EventSubject) -> Option<AccessEvent> {
        match self.store.most_recent_event_for(subject).await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(error = %e, ?subject, "history unavailable, defaulting to IN");
                None
            }
        }
    }

    /// Persists, then publishes. A failed append is never published.
    async fn commit(&self, event: NewAccessEvent) -> Result<AccessEvent, GatewayError> {
        let credential = event.credential_id().to_string();
        let stored = self
            .store
            .insert_event(event)
            .await
            .inspect_err(|e| self.record_drop(&credential, e))?;

        tracing::info!(
            event_id = %stored.id,
            credential = %stored.credential_id,
            user_id = ?stored.user_id.map(UserId::get),
            direction = stored.direction.as_str(),
            status = stored.status.as_str(),
            method = stored.method.as_str(),
            "access event recorded"
        );
        self.hub.publish_access_event(&stored);
        Ok(stored)
    }

    fn record_drop(&self, credential: &str, error: &GatewayError) {
        let total = self
            .dropped_events
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        tracing::error!(%credential, %error, dropped_events = total, "event dropped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::domain::{EventBus, HubEvent, NewUser, User};
    use crate::link::HardwareLink;
    use crate::persistence::InMemoryEventStore;
    use serde_json::json;
    use tokio::sync::broadcast;

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        classifier: Arc<EventClassifier<InMemoryEventStore>>,
        events: broadcast::Receiver<HubEvent>,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new(256);
        let link = Arc::new(HardwareLink::new(
            LinkConfig::new("true", Vec::new()),
            bus.clone(),
        ));
        let hub = BroadcastHub::new(bus, link);
        let events = hub.subscribe();
        let store = Arc::new(InMemoryEventStore::new());
        let classifier = Arc::new(EventClassifier::new(Arc::clone(&store), hub));
        Fixture {
            store,
            classifier,
            events,
        }
    }

    async fn add_user(store: &InMemoryEventStore, name: &str, credential: &str) -> User {
        let Ok(new_user) = NewUser::new(name, credential) else {
            panic!("invalid user");
        };
        let Ok(user) = store.insert_user(new_user).await else {
            panic!("insert_user failed");
        };
        user
    }

    fn read(value: serde_json::Value) -> HardwareMessage {
        let Ok(message) = HardwareMessage::from_value(value) else {
            panic!("invalid test message");
        };
        message
    }

    async fn classify(fixture: &Fixture, value: serde_json::Value) -> AccessEvent {
        let Ok(event) = fixture.classifier.classify(read(value)).await else {
            panic!("classification failed");
        };
        event
    }

    fn next_broadcast(fixture: &mut Fixture) -> Option<AccessEvent> {
        match fixture.events.try_recv() {
            Ok(HubEvent::AccessEvent { event }) => Some(event),
            _ => None,
        }
    }

    #[tokio::test]
    async fn known_credential_first_read_is_successful_entry() {
        let mut fx = fixture();
        let ada = add_user(&fx.store, "Ada", "AB12").await;

        let event = classify(&fx, json!({"credentialId": "AB12", "success": true})).await;
        assert_eq!(event.user_id, Some(ada.id));
        assert_eq!(event.direction, Direction::In);
        assert_eq!(event.status, Status::Success);
        assert_eq!(event.method, Method::Scanned);
        assert_eq!(event.raw_payload["credentialId"], "AB12");

        let broadcast = next_broadcast(&mut fx);
        assert_eq!(broadcast, Some(event));
        assert!(next_broadcast(&mut fx).is_none(), "exactly one broadcast");
    }

    #[tokio::test]
    async fn repeated_read_toggles_direction() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;
        let line = json!({"credentialId": "AB12", "success": true});

        let first = classify(&fx, line.clone()).await;
        let second = classify(&fx, line).await;
        assert_eq!(first.direction, Direction::In);
        assert_eq!(second.direction, Direction::Out);
        assert_eq!(first.status, Status::Success);
        assert_eq!(second.status, Status::Success);
    }

    async fn directions_for(fx: &Fixture, credential: &str, successes: &[bool]) -> Vec<Direction> {
        let mut directions = Vec::new();
        for success in successes {
            let event = classify(fx, json!({"credentialId": credential, "success": success})).await;
            directions.push(event.direction);
        }
        directions
    }

    fn alternating(n: usize) -> Vec<Direction> {
        (0..n)
            .map(|i| if i % 2 == 0 { Direction::In } else { Direction::Out })
            .collect()
    }

    #[tokio::test]
    async fn direction_alternates_when_success_leads() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;

        let successes: Vec<bool> = (0..8).map(|i| i % 2 == 0).collect();
        assert_eq!(directions_for(&fx, "AB12", &successes).await, alternating(8));
    }

    #[tokio::test]
    async fn direction_alternates_when_failure_leads() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;

        let directions = directions_for(&fx, "AB12", &[false, true, false, true]).await;
        assert_eq!(directions, alternating(4));
    }

    #[tokio::test]
    async fn unknown_credential_alternates_too() {
        let fx = fixture();
        let directions = directions_for(&fx, "ZZ99", &[true, true]).await;
        assert_eq!(directions, [Direction::In, Direction::Out]);
    }

    #[tokio::test]
    async fn unknown_credential_is_always_failure() {
        let mut fx = fixture();

        let event = classify(&fx, json!({"credentialId": "ZZ99", "success": true})).await;
        assert_eq!(event.user_id, None);
        assert_eq!(event.status, Status::Failure);
        assert_eq!(event.direction, Direction::In);
        assert!(next_broadcast(&mut fx).is_some());

        let again = classify(&fx, json!({"credentialId": "ZZ99", "success": true})).await;
        assert_eq!(again.status, Status::Failure);
        assert_eq!(again.user_id, None);
    }

    #[tokio::test]
    async fn failed_read_of_known_user_is_failure() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;

        let failed = classify(&fx, json!({"credentialId": "AB12", "success": false})).await;
        assert_eq!(failed.status, Status::Failure);
        assert_eq!(failed.direction, Direction::In);

        let retry = classify(&fx, json!({"credentialId": "AB12"})).await;
        assert_eq!(retry.status, Status::Success);
        assert_eq!(retry.direction, Direction::Out);
    }

    #[tokio::test]
    async fn unreadable_success_flag_never_grants_access() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;

        let string_flag = classify(&fx, json!({"credentialId": "AB12", "success": "false"})).await;
        let numeric_flag = classify(&fx, json!({"credentialId": "AB12", "success": 0})).await;
        assert_eq!(string_flag.status, Status::Failure);
        assert_eq!(numeric_flag.status, Status::Failure);
    }

    #[tokio::test]
    async fn missing_credential_is_malformed_and_silent() {
        let mut fx = fixture();
        let result = fx.classifier.classify(read(json!({"success": true}))).await;

        assert!(matches!(result, Err(GatewayError::MalformedEvent(_))));
        assert_eq!(fx.store.event_count().await, 0);
        assert!(next_broadcast(&mut fx).is_none());
        assert_eq!(fx.classifier.stats().malformed_events, 1);
    }

    #[tokio::test]
    async fn storage_failure_is_never_broadcast() {
        let mut fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;
        fx.store.fail_inserts(true);

        let result = fx
            .classifier
            .classify(read(json!({"credentialId": "AB12", "success": true})))
            .await;
        assert!(matches!(result, Err(GatewayError::StorageFailure(_))));
        assert!(next_broadcast(&mut fx).is_none());
        assert_eq!(fx.classifier.stats().dropped_events, 1);

        fx.store.fail_inserts(false);
        let recovered = classify(&fx, json!({"credentialId": "AB12"})).await;
        assert_eq!(recovered.direction, Direction::In);
    }

    #[tokio::test]
    async fn unreadable_history_defaults_to_in() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;
        classify(&fx, json!({"credentialId": "AB12"})).await;

        fx.store.fail_history(true);
        let event = classify(&fx, json!({"credentialId": "AB12"})).await;
        assert_eq!(event.direction, Direction::In);
    }

    #[tokio::test]
    async fn broadcast_event_is_already_queryable() {
        let mut fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;
        classify(&fx, json!({"credentialId": "AB12"})).await;

        let Some(broadcast) = next_broadcast(&mut fx) else {
            panic!("expected a broadcast");
        };
        let found = fx.store.find_event(broadcast.id).await;
        assert_eq!(found.ok().flatten(), Some(broadcast));
    }

    #[tokio::test]
    async fn concurrent_reads_of_one_credential_never_repeat_direction() {
        let fx = fixture();
        add_user(&fx.store, "Ada", "AB12").await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let classifier = Arc::clone(&fx.classifier);
                tokio::spawn(async move {
                    classifier
                        .classify(read(json!({"credentialId": "AB12"})))
                        .await
                })
            })
            .collect();
        for outcome in futures_util::future::join_all(tasks).await {
            assert!(matches!(outcome, Ok(Ok(_))));
        }

        let Ok(mut history) = fx.store.list_recent_events(10).await else {
            panic!("history unavailable");
        };
        history.reverse();
        let directions: Vec<Direction> = history.iter().map(|e| e.direction).collect();
        let expected: Vec<Direction> = (0..10)
            .map(|i| if i % 2 == 0 { Direction::In } else { Direction::Out })
            .collect();
        assert_eq!(directions, expected);
    }

    #[tokio::test]
    async fn manual_entry_shares_the_direction_rule() {
        let mut fx = fixture();
        let ada = add_user(&fx.store, "Ada", "AB12").await;
        classify(&fx, json!({"credentialId": "AB12"})).await;
        let _ = next_broadcast(&mut fx);

        let Ok(manual) = fx.classifier.record_manual(ada.id).await else {
            panic!("manual entry failed");
        };
        assert_eq!(manual.method, Method::Manual);
        assert_eq!(manual.status, Status::Success);
        assert_eq!(manual.direction, Direction::Out);
        assert_eq!(manual.credential_id, "AB12");
        assert_eq!(next_broadcast(&mut fx), Some(manual));
    }

    #[tokio::test]
    async fn manual_entry_for_unknown_user_fails() {
        let fx = fixture();
        let result = fx.classifier.record_manual(UserId::new(404)).await;
        assert!(matches!(result, Err(GatewayError::UserNotFound(404))));
        assert_eq!(fx.store.event_count().await, 0);
    }
}
