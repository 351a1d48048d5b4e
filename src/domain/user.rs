//! User directory entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// A person holding exactly one credential.
///
/// Created through the administrative insert path and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Credential token (card UID or keypad code), unique across users.
    pub credential_id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A user that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Credential token, must be unique.
    pub credential_id: String,
}

impl NewUser {
    /// Builds a new user, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GatewayError::InvalidRequest`] when the name
    /// or the credential is empty.
    pub fn new(
        name: impl Into<String>,
        credential_id: impl Into<String>,
    ) -> Result<Self, crate::error::GatewayError> {
        let name = name.into().trim().to_string();
        let credential_id = credential_id.into().trim().to_string();
        if name.is_empty() {
            return Err(crate::error::GatewayError::InvalidRequest(
                "name must not be empty".to_string(),
            ));
        }
        if credential_id.is_empty() {
            return Err(crate::error::GatewayError::InvalidRequest(
                "credentialId must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            credential_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_user_trims_input() {
        let Ok(user) = NewUser::new("  Ada ", " AB12\n") else {
            panic!("valid user rejected");
        };
        assert_eq!(user.name, "Ada");
        assert_eq!(user.credential_id, "AB12");
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(NewUser::new("", "AB12").is_err());
        assert!(NewUser::new("Ada", "   ").is_err());
    }
}
