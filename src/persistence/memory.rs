//! In-memory event store.
//!
//! A substitutable fake for [`super::SqliteEventStore`]: same contract, no
//! I/O. Failures can be injected to exercise the storage-failure paths.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::EventStore;
use crate::domain::{AccessEvent, EventId, EventSubject, NewAccessEvent, NewUser, User, UserId};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    events: Vec<AccessEvent>,
}

/// Event store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    tables: RwLock<Tables>,
    fail_inserts: AtomicBool,
    fail_history: AtomicBool,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `insert_event` fail (or succeed again).
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `most_recent_event_for` fail (or succeed again).
    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    /// Number of appended events.
    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }
}

impl EventStore for InMemoryEventStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, GatewayError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.credential_id == user.credential_id)
        {
            return Err(GatewayError::CredentialConflict(user.credential_id));
        }
        let id = i64::try_from(tables.users.len())
            .map_err(|e| GatewayError::StorageFailure(e.to_string()))?
            + 1;
        let stored = User {
            id: UserId::new(id),
            name: user.name,
            credential_id: user.credential_id,
            created_at: Utc::now(),
        };
        tables.users.push(stored.clone());
        Ok(stored)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<User>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.credential_id == credential_id)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn insert_event(&self, event: NewAccessEvent) -> Result<AccessEvent, GatewayError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(GatewayError::StorageFailure(
                "injected insert failure".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        let id = i64::try_from(tables.events.len())
            .map_err(|e| GatewayError::StorageFailure(e.to_string()))?
            + 1;
        let stored = event.into_stored(EventId::new(id));
        tables.events.push(stored.clone());
        Ok(stored)
    }

    async fn find_event(&self, id: EventId) -> Result<Option<AccessEvent>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables.events.iter().find(|e| e.id == id).cloned())
    }

    async fn most_recent_event_for(
        &self,
        subject: &EventSubject,
    ) -> Result<Option<AccessEvent>, GatewayError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(GatewayError::StorageFailure(
                "injected history failure".to_string(),
            ));
        }
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .rev()
            .find(|e| match subject {
                EventSubject::User(user_id) => e.user_id == Some(*user_id),
                EventSubject::Credential(credential_id) => &e.credential_id == credential_id,
            })
            .cloned())
    }

    async fn list_recent_events(&self, limit: u32) -> Result<Vec<AccessEvent>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AccessEvent>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp < to)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
