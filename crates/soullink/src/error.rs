//! Unified error type for the Soul Link server.

use soullink_auth::AuthError;
use soullink_protocol::ProtocolError;
use soullink_roster::RosterError;
use soullink_store::StoreError;
use soullink_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SoulLinkError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sign-in, sign-up, or guest-cookie failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session or roster failure (duplicate species, not your team, ...).
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: SoulLinkError = err.into();
        assert!(matches!(err, SoulLinkError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: SoulLinkError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, SoulLinkError::Protocol(_)));
    }

    #[test]
    fn test_from_roster_error_keeps_message() {
        let err: SoulLinkError = RosterError::Unauthorized.into();
        assert!(matches!(err, SoulLinkError::Roster(RosterError::Unauthorized)));
        assert_eq!(err.to_string(), RosterError::Unauthorized.to_string());
    }

    #[test]
    fn test_from_auth_and_store_errors() {
        let err: SoulLinkError = AuthError::InvalidCredentials.into();
        assert!(matches!(err, SoulLinkError::Auth(_)));
        let err: SoulLinkError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, SoulLinkError::Store(_)));
    }
}
