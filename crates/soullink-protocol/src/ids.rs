//! Identifier newtypes.
//!
//! Every row in the tracker (profiles, sessions, rosters, entries) is keyed
//! by a random UUID. Wrapping each in its own newtype means a `RosterId`
//! can never be passed where a `SessionId` is expected, even though both
//! are a `Uuid` underneath.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier type.
///
/// Each generated type serializes as a plain UUID string
/// (`#[serde(transparent)]`), displays as the bare UUID, and can be
/// minted with `new()`.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mints a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a user: an account holder or a guest.
    UserId
);
uuid_id!(
    /// A paired Soul Link session between two users.
    SessionId
);
uuid_id!(
    /// One participant's six-slot roster inside a session.
    RosterId
);
uuid_id!(
    /// A Pokémon occupying one roster slot.
    EntryId
);

// ---------------------------------------------------------------------------
// SlotIndex
// ---------------------------------------------------------------------------

/// Number of slots in every roster.
pub const ROSTER_SLOTS: usize = 6;

/// A roster slot position, guaranteed to be in `0..6`.
///
/// Deserialization goes through `TryFrom<u8>`, so a client sending
/// `"slot": 9` is rejected while decoding instead of reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Returns `Some` when `index` addresses one of the six slots.
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < ROSTER_SLOTS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// All six slots in order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..ROSTER_SLOTS as u8).map(SlotIndex)
    }

    /// The index as a `usize`, for addressing arrays.
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotIndex::new(value).ok_or_else(|| {
            format!("slot index {value} out of range 0..{ROSTER_SLOTS}")
        })
    }
}

impl From<SlotIndex> for u8 {
    fn from(slot: SlotIndex) -> u8 {
        slot.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}
