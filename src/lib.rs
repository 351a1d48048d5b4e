//! # access-gateway
//!
//! Access-control gateway between a badge/keypad hardware agent and its
//! operators.
//!
//! The gateway supervises the hardware agent as a child process and talks
//! to it in newline-delimited JSON over stdio. Every read is classified
//! (who, entry or exit, success or failure), appended to the event store
//! and then pushed to every real-time subscriber. Subscribers can send
//! remote-control commands back to the agent.
//!
//! ## Architecture
//!
//! ```text
//! Hardware agent (child process, stdio)
//!     │
//!     ├── HardwareLink (link/)        supervision, IPC codec
//!     ├── ShardedDispatcher (service/) per-credential ordering
//!     ├── EventClassifier (service/)   direction + status rules
//!     │
//!     ├── EventStore (persistence/)    SQLite via sqlx
//!     ├── BroadcastHub (service/)      EventBus fan-out, command relay
//!     │
//!     ├── REST Handlers (api/)
//!     └── WS Handler (ws/)
//!             │
//!         Clients (HTTP, WebSocket)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod link;
pub mod persistence;
pub mod service;
pub mod ws;
