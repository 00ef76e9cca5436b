use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::UserId;

/// A registered user, as exposed outside the registry.
///
/// Credential material (password and security-answer hashes) never leaves
/// the `auth` module; this type carries only the public identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl User {
    /// Assembles a user from its stored fields.
    pub fn new(id: UserId, username: impl Into<String>, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            username: username.into(),
            created_at,
        }
    }

    /// Returns the user's unique ID.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns when the account was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}
