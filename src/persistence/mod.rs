//! Persistence layer: the event store.
//!
//! [`EventStore`] is the storage interface consumed by the classifier and
//! the REST handlers: an append-only access log plus the user directory.
//! [`SqliteEventStore`] is the durable implementation backed by
//! `sqlx::SqlitePool`; [`InMemoryEventStore`] is a substitutable fake with
//! failure injection.

pub mod memory;
pub mod models;
pub mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{AccessEvent, EventId, EventSubject, NewAccessEvent, NewUser, User, UserId};
use crate::error::GatewayError;

pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;

/// Storage interface for users and access events.
///
/// Every method returns [`GatewayError::StorageFailure`] when the backend
/// fails; lookups return `Ok(None)` for missing rows.
pub trait EventStore: Send + Sync + 'static {
    /// Adds a user to the directory.
    ///
    /// # Errors
    ///
    /// [`GatewayError::CredentialConflict`] if the credential is taken.
    fn insert_user(&self, user: NewUser)
    -> impl Future<Output = Result<User, GatewayError>> + Send;

    /// Looks up a user by ID.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn find_user(&self, id: UserId)
    -> impl Future<Output = Result<Option<User>, GatewayError>> + Send;

    /// Resolves a credential to its user.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn find_user_by_credential(
        &self,
        credential_id: &str,
    ) -> impl Future<Output = Result<Option<User>, GatewayError>> + Send;

    /// Lists all users ordered by ID.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, GatewayError>> + Send;

    /// Appends an event and returns it with its store-assigned ID.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure; nothing is
    /// appended in that case.
    fn insert_event(
        &self,
        event: NewAccessEvent,
    ) -> impl Future<Output = Result<AccessEvent, GatewayError>> + Send;

    /// Looks up an event by ID.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn find_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<AccessEvent>, GatewayError>> + Send;

    /// Returns the last appended event for a user or credential.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn most_recent_event_for(
        &self,
        subject: &EventSubject,
    ) -> impl Future<Output = Result<Option<AccessEvent>, GatewayError>> + Send;

    /// Returns up to `limit` events, newest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn list_recent_events(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AccessEvent>, GatewayError>> + Send;

    /// Returns events with `from <= timestamp < to`, oldest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] on backend failure.
    fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<AccessEvent>, GatewayError>> + Send;

    /// Verifies the backend is reachable.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StorageFailure`] if it is not.
    fn health_check(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
