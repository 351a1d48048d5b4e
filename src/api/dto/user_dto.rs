//! User directory request types.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::NewUser;
use crate::error::GatewayError;

/// Request body for `POST /api/v1/users`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Display name.
    pub name: String,
    /// Credential (card UID or keypad code) to assign.
    #[serde(alias = "card_uid")]
    pub credential_id: String,
}

impl TryFrom<CreateUserRequest> for NewUser {
    type Error = GatewayError;

    fn try_from(req: CreateUserRequest) -> Result<Self, Self::Error> {
        Self::new(req.name, req.credential_id)
    }
}
