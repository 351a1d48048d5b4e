//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase on the wire, matching the domain types.

pub mod common_dto;
pub mod event_dto;
pub mod link_dto;
pub mod user_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use link_dto::*;
pub use user_dto::*;
