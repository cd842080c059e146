//! Error types for the protocol layer.

/// Errors raised while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame isn't a well-formed envelope: malformed JSON, a missing
    /// field, an unknown `op`, or a slot index outside `0..6`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule, e.g. the first frame
    /// isn't a handshake or the handshake names the wrong version.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
