//! Hardware link: supervision of the hardware agent and its IPC protocol.
//!
//! The agent is a black-box peer process that reports credential reads on
//! stdout and accepts remote-control commands on stdin, one JSON object per
//! line. Its stderr is surfaced as log output only.

pub mod codec;
pub mod supervisor;

pub use codec::{InboundFrame, IpcCodec};
pub use supervisor::{HardwareLink, LinkDiagnostics, MessageSink};
