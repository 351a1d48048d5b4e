//! WebSocket layer: real-time event stream and remote-control commands.
//!
//! Every connection at `/ws` is a hub subscriber. Access events and link
//! status changes are pushed as `event` envelopes; `command` envelopes from
//! the client are relayed to the hardware agent.

pub mod connection;
pub mod handler;
pub mod messages;
