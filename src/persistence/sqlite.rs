//! SQLite implementation of the event store.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use super::EventStore;
use super::models::{EventRow, UserRow, to_micros};
use crate::config::DatabaseConfig;
use crate::domain::{AccessEvent, EventId, EventSubject, NewAccessEvent, NewUser, User, UserId};
use crate::error::GatewayError;

const EVENT_COLUMNS: &str =
    "id, user_id, credential_id, direction, method, status, occurred_at, raw_payload";

/// SQLite-backed event store using `sqlx::SqlitePool`.
///
/// Opened once at startup and shared by every component; migrations are
/// embedded and applied on open.
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Opens (creating if missing) the database and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] if the URL is invalid, the
    /// database cannot be opened, or a migration fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, GatewayError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        if let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::StorageFailure(format!("cannot create database directory: {e}"))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Opens a private in-memory database (primarily for tests).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] if migrations fail.
    pub async fn in_memory() -> Result<Self, GatewayError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // One connection that never expires: the database lives inside it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, GatewayError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("event store ready");
        Ok(Self { pool })
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl EventStore for SqliteEventStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, GatewayError> {
        let created_at = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, credential_id, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&user.name)
        .bind(&user.credential_id)
        .bind(to_micros(created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                GatewayError::CredentialConflict(user.credential_id.clone())
            }
            other => GatewayError::from(other),
        })?;

        tracing::info!(user_id = id, credential = %user.credential_id, "user created");
        Ok(User {
            id: UserId::new(id),
            name: user.name,
            credential_id: user.credential_id,
            created_at: super::models::from_micros(to_micros(created_at))?,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, GatewayError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, credential_id, created_at FROM users WHERE id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<User>, GatewayError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, credential_id, created_at FROM users WHERE credential_id = ?",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, credential_id, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn insert_event(&self, event: NewAccessEvent) -> Result<AccessEvent, GatewayError> {
        let raw_payload = serde_json::to_string(event.raw_payload())
            .map_err(|e| GatewayError::StorageFailure(format!("unserializable payload: {e}")))?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO access_events \
             (user_id, credential_id, direction, method, status, occurred_at, raw_payload) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(event.user_id().map(UserId::get))
        .bind(event.credential_id())
        .bind(event.direction().as_str())
        .bind(event.method().as_str())
        .bind(event.status().as_str())
        .bind(to_micros(event.timestamp()))
        .bind(raw_payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(event.into_stored(EventId::new(id)))
    }

    async fn find_event(&self, id: EventId) -> Result<Option<AccessEvent>, GatewayError> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM access_events WHERE id = ?"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?
        .map(AccessEvent::try_from)
        .transpose()
    }

    async fn most_recent_event_for(
        &self,
        subject: &EventSubject,
    ) -> Result<Option<AccessEvent>, GatewayError> {
        let row = match subject {
            EventSubject::User(user_id) => {
                sqlx::query_as::<_, EventRow>(&format!(
                    "SELECT {EVENT_COLUMNS} FROM access_events \
                     WHERE user_id = ? ORDER BY id DESC LIMIT 1"
                ))
                .bind(user_id.get())
                .fetch_optional(&self.pool)
                .await?
            }
            EventSubject::Credential(credential_id) => {
                sqlx::query_as::<_, EventRow>(&format!(
                    "SELECT {EVENT_COLUMNS} FROM access_events \
                     WHERE credential_id = ? ORDER BY id DESC LIMIT 1"
                ))
                .bind(credential_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        row.map(AccessEvent::try_from).transpose()
    }

    async fn list_recent_events(&self, limit: u32) -> Result<Vec<AccessEvent>, GatewayError> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM access_events ORDER BY id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AccessEvent::try_from)
        .collect()
    }

    async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AccessEvent>, GatewayError> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM access_events \
             WHERE occurred_at >= ? AND occurred_at < ? ORDER BY id ASC"
        ))
        .bind(to_micros(from))
        .bind(to_micros(to))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AccessEvent::try_from)
        .collect()
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Direction, Method, Status};
    use tokio_test::{assert_err, assert_ok};

    async fn store() -> SqliteEventStore {
        let Ok(store) = SqliteEventStore::in_memory().await else {
            panic!("in-memory store failed to open");
        };
        store
    }

    async fn add_user(store: &SqliteEventStore, name: &str, credential: &str) -> User {
        let Ok(new_user) = NewUser::new(name, credential) else {
            panic!("invalid user");
        };
        let Ok(user) = store.insert_user(new_user).await else {
            panic!("insert_user failed");
        };
        user
    }

    fn scanned(user: Option<&User>, credential: &str, direction: Direction) -> NewAccessEvent {
        NewAccessEvent::new(
            user.map(|u| u.id),
            credential,
            direction,
            Method::Scanned,
            Status::Success,
            serde_json::json!({ "credentialId": credential }),
        )
    }

    #[tokio::test]
    async fn user_directory_round_trip() {
        let store = store().await;
        let ada = add_user(&store, "Ada", "AB12").await;

        let by_credential = store.find_user_by_credential("AB12").await;
        assert_eq!(by_credential.ok().flatten().map(|u| u.id), Some(ada.id));

        let by_id = store.find_user(ada.id).await;
        assert_eq!(by_id.ok().flatten().map(|u| u.name), Some("Ada".to_string()));

        let missing = store.find_user_by_credential("ZZ99").await;
        assert!(matches!(missing, Ok(None)));

        let listed = store.list_users().await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_credential_conflicts() {
        let store = store().await;
        add_user(&store, "Ada", "AB12").await;
        let Ok(dup) = NewUser::new("Grace", "AB12") else {
            panic!("invalid user");
        };
        let result = store.insert_user(dup).await;
        assert!(matches!(result, Err(GatewayError::CredentialConflict(c)) if c == "AB12"));
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = store().await;
        let ada = add_user(&store, "Ada", "AB12").await;

        let first = assert_ok!(store.insert_event(scanned(Some(&ada), "AB12", Direction::In)).await);
        let second =
            assert_ok!(store.insert_event(scanned(Some(&ada), "AB12", Direction::Out)).await);
        assert!(second.id > first.id);

        let found = assert_ok!(store.find_event(first.id).await);
        assert_eq!(found, Some(first));
    }

    #[tokio::test]
    async fn most_recent_by_user_and_credential() {
        let store = store().await;
        let ada = add_user(&store, "Ada", "AB12").await;

        assert!(matches!(
            store.most_recent_event_for(&EventSubject::User(ada.id)).await,
            Ok(None)
        ));

        assert_ok!(store.insert_event(scanned(Some(&ada), "AB12", Direction::In)).await);
        let last = assert_ok!(store.insert_event(scanned(Some(&ada), "AB12", Direction::Out)).await);
        assert_ok!(store.insert_event(scanned(None, "ZZ99", Direction::In)).await);

        let by_user = assert_ok!(store.most_recent_event_for(&EventSubject::User(ada.id)).await);
        assert_eq!(by_user.map(|e| e.id), Some(last.id));

        let by_credential = assert_ok!(
            store
                .most_recent_event_for(&EventSubject::Credential("ZZ99".to_string()))
                .await
        );
        let Some(unknown) = by_credential else {
            panic!("expected event for ZZ99");
        };
        assert!(unknown.user_id.is_none());
        assert_eq!(unknown.status, Status::Failure);
    }

    #[tokio::test]
    async fn recent_events_newest_first_with_limit() {
        let store = store().await;
        for i in 0..5 {
            let credential = format!("C{i}");
            assert_ok!(store.insert_event(scanned(None, &credential, Direction::In)).await);
        }
        let recent = assert_ok!(store.list_recent_events(3).await);
        let credentials: Vec<&str> = recent.iter().map(|e| e.credential_id.as_str()).collect();
        assert_eq!(credentials, vec!["C4", "C3", "C2"]);
    }

    #[tokio::test]
    async fn time_range_is_half_open() {
        let store = store().await;
        let event = assert_ok!(store.insert_event(scanned(None, "AB12", Direction::In)).await);

        let hit = assert_ok!(
            store
                .list_events_between(event.timestamp, event.timestamp + chrono::Duration::seconds(1))
                .await
        );
        assert_eq!(hit.len(), 1);

        let miss = assert_ok!(
            store
                .list_events_between(event.timestamp - chrono::Duration::seconds(1), event.timestamp)
                .await
        );
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_reference_is_rejected() {
        let store = store().await;
        let ghost = NewAccessEvent::new(
            Some(UserId::new(999)),
            "AB12",
            Direction::In,
            Method::Manual,
            Status::Success,
            serde_json::Value::Null,
        );
        assert_err!(store.insert_event(ghost).await);
    }

    #[tokio::test]
    async fn health_check_passes() {
        let store = store().await;
        assert_ok!(store.health_check().await);
        store.close().await;
        assert_err!(store.health_check().await);
    }
}
