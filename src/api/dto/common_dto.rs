//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{AccessEvent, User};

/// List of users.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListResponse {
    /// Users ordered by ID.
    pub data: Vec<User>,
    /// Number of entries in `data`.
    pub count: usize,
}

impl From<Vec<User>> for UserListResponse {
    fn from(data: Vec<User>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// List of access events.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events, ordered as documented by the endpoint.
    pub data: Vec<AccessEvent>,
    /// Number of entries in `data`.
    pub count: usize,
}

impl From<Vec<AccessEvent>> for EventListResponse {
    fn from(data: Vec<AccessEvent>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}
