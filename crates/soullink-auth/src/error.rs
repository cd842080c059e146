//! Error types for the auth layer.

use soullink_protocol::{ErrorCode, UserId};
use soullink_store::StoreError;

/// Errors raised by the identity provider, the gateway, and guest-mode
/// persistence.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The operation needs a signed-in account and there is none.
    #[error("not signed in")]
    Unauthenticated,

    /// Wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The access token is unknown or was signed out.
    #[error("access token is invalid or expired")]
    InvalidToken,

    /// Another profile already uses this display handle.
    #[error("handle `{0}` is already taken")]
    HandleTaken(String),

    /// The identity provider already has an account for this email.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// A field failed validation before anything was sent anywhere.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider knows the account but the store has no profile row.
    #[error("no profile for user {0}")]
    ProfileMissing(UserId),

    /// A guest-mode cookie exists but doesn't decode.
    #[error("cookie `{name}` is corrupt: {reason}")]
    CorruptCookie { name: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The identity provider couldn't be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// The wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated | Self::InvalidToken | Self::ProfileMissing(_) => {
                ErrorCode::Unauthenticated
            }
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::HandleTaken(_) => ErrorCode::HandleTaken,
            Self::EmailTaken => ErrorCode::Conflict,
            Self::InvalidInput(_) | Self::CorruptCookie { .. } => ErrorCode::InvalidInput,
            Self::Unavailable(_) | Self::Store(StoreError::Unavailable(_)) => ErrorCode::Unavailable,
            Self::Store(StoreError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Store(StoreError::CheckViolation(_)) => ErrorCode::InvalidInput,
            Self::Store(StoreError::UniqueViolation { .. }) => ErrorCode::Conflict,
        }
    }
}
