//! Domain layer: users, access events, hardware messages and the event system.
//!
//! This module contains the server-side domain model: identifiers, the user
//! directory entry, the append-only access event, the transient hardware
//! message, the link supervision state, the broadcast bus, and the
//! per-credential locks that keep classification ordered.

pub mod access_event;
pub mod credential_locks;
pub mod event_bus;
pub mod hardware_message;
pub mod hub_event;
pub mod ids;
pub mod link_state;
pub mod user;

pub use access_event::{AccessEvent, Direction, EventSubject, Method, NewAccessEvent, Status};
pub use credential_locks::CredentialLocks;
pub use event_bus::EventBus;
pub use hardware_message::{HardwareMessage, ReadKind, RemoteAction, RemoteCommand};
pub use hub_event::HubEvent;
pub use ids::{EventId, UserId};
pub use link_state::{LinkState, LinkStatus};
pub use user::{NewUser, User};
