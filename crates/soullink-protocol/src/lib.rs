//! Wire protocol and domain types for the Soul Link tracker.
//!
//! This crate defines the vocabulary every other crate speaks:
//!
//! - **Identifiers** ([`UserId`], [`SessionId`], [`RosterId`], [`EntryId`],
//!   [`SlotIndex`]).
//! - **Domain types** ([`Roster`], [`RosterEntry`], [`Slot`],
//!   [`StatBlock`], [`Status`], ...): explicit schemas for every field a
//!   roster entry carries.
//! - **Wire messages** ([`Envelope`], [`Payload`], [`Request`], [`Reply`],
//!   [`Push`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Auth / Roster logic
//! ```

mod codec;
mod error;
mod ids;
mod model;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{EntryId, ROSTER_SLOTS, RosterId, SessionId, SlotIndex, UserId};
pub use model::{
    EV_MAX, EntryDraft, IV_MAX, Identity, IdentityKind, Move, Nature,
    PokemonType, Roster, RosterEntry, RosterSnapshot, SessionSummary, Slot,
    Species, Sprites, StatBlock, StatKind, Status,
};
pub use types::{
    Envelope, ErrorCode, Payload, Push, Reply, Request, SystemMessage,
};

/// Protocol version clients must name in their handshake.
pub const PROTOCOL_VERSION: u32 = 1;
