//! Error types for the roster layer.

use soullink_protocol::ErrorCode;
use soullink_store::StoreError;

/// Message shown when the Soul Link rule rejects a catch.
pub const DUPLICATE_MESSAGE: &str = "This Pokémon is already caught by your partner!";

/// Errors that can occur in session and roster operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// No signed-in account (guests included).
    #[error("sign in to continue")]
    Unauthenticated,

    /// No profile has the handle given as partner.
    #[error("no trainer with handle `{0}`")]
    PartnerNotFound(String),

    /// The species is already held by some roster of the session.
    #[error("{species} is already caught in this session")]
    DuplicateInSession { species: String },

    /// The session, roster, or entry doesn't exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller doesn't own the roster, or isn't in the session.
    #[error("you can only modify your own team")]
    Unauthorized,

    /// The request can't apply to the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store failed transiently. Nothing was changed.
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
}

impl RosterError {
    /// The wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::PartnerNotFound(_) => ErrorCode::PartnerNotFound,
            Self::DuplicateInSession { .. } => ErrorCode::DuplicateInSession,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }

    /// The text a player sees for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::DuplicateInSession { .. } => DUPLICATE_MESSAGE.to_string(),
            Self::Unauthorized => "You can only modify your own team!".to_string(),
            Self::PartnerNotFound(handle) => format!("Partner `{handle}` not found"),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::Unavailable(reason),
            StoreError::NotFound { table } => Self::NotFound(table),
            StoreError::CheckViolation(reason) => Self::InvalidInput(reason),
            StoreError::UniqueViolation { constraint } => {
                Self::Conflict(format!("constraint `{constraint}` violated"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_is_partner_wording() {
        let err = RosterError::DuplicateInSession {
            species: "Pikachu".into(),
        };
        assert_eq!(err.code(), ErrorCode::DuplicateInSession);
        assert_eq!(err.user_message(), DUPLICATE_MESSAGE);
    }

    #[test]
    fn test_store_errors_map_to_roster_errors() {
        assert_eq!(
            RosterError::from(StoreError::Unavailable("down".into())),
            RosterError::Unavailable("down".into())
        );
        assert_eq!(
            RosterError::from(StoreError::NotFound { table: "rosters" }),
            RosterError::NotFound("rosters")
        );
        assert_eq!(
            RosterError::from(StoreError::CheckViolation("bad".into())).code(),
            ErrorCode::InvalidInput
        );
    }
}
