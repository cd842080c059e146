//! Envelope codecs.
//!
//! The server never serializes anything except [`Envelope`]s, so the codec
//! trait is specialised to them rather than generic over any serde type.
//! That keeps the trait object-safe and lets a codec say whether its output
//! is text, which decides the WebSocket frame type.

use crate::{Envelope, ProtocolError};

/// Converts envelopes to and from frame bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the envelope can't be
    /// represented in this format.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Parses an envelope from frame bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] for malformed or unknown messages.
    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;

    /// `true` when [`encode`](Self::encode) produces UTF-8 text, so the
    /// transport can send text frames that browsers read directly.
    fn is_text(&self) -> bool;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// JSON envelopes via `serde_json`. Behind the `json` feature (default).
///
/// ```rust
/// use soullink_protocol::{Codec, Envelope, JsonCodec, Payload, SystemMessage};
///
/// let codec = JsonCodec;
/// let env = Envelope::new(1, 5, Payload::System(SystemMessage::Heartbeat { client_time: 5 }));
/// let bytes = codec.encode(&env).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), env);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty frame".into()));
        }
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn is_text(&self) -> bool {
        true
    }
}
