use thiserror::Error;

/// Errors produced by the note service and user registry.
///
/// Not-found and not-owned are deliberately indistinguishable: every
/// owner-scoped query filters by the acting user, so a note that exists but
/// belongs to someone else reports the same `NotFound` as a note that does
/// not exist at all.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input. Reported before any store access.
    #[error("{0}")]
    Validation(String),

    /// The target row is absent or owned by another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint was violated (duplicate username, token collision).
    #[error("{0}")]
    Conflict(String),

    /// Credential hashing failure.
    #[error("credential hashing failed: {0}")]
    Hash(String),

    /// Underlying store failure. Diagnostic detail for operators; callers
    /// should show users a generic message.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ServiceError {
    /// Builds a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for failures caused by the caller's input rather than the store.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}
