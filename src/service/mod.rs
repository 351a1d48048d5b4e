//! Ingestion pipeline and real-time fan-out.
//!
//! - [`ShardedDispatcher`]: receives messages from the hardware link and
//!   queues them per credential.
//! - [`EventClassifier`]: turns each message into a persisted event.
//! - [`BroadcastHub`]: publishes persisted events and relays commands.

pub mod classifier;
pub mod dispatcher;
pub mod hub;

pub use classifier::{ClassifierStats, EventClassifier};
pub use dispatcher::ShardedDispatcher;
pub use hub::BroadcastHub;
