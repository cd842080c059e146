//! Row types for the four tables.
//!
//! Entries are stored as [`RosterEntry`](soullink_protocol::RosterEntry)
//! directly; the other tables get their own row structs because the wire
//! types carry joined or computed fields (handles, slots) the rows don't.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soullink_protocol::{Roster, RosterId, SessionId, UserId};

/// `profiles`: one row per account, keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    /// Unique display handle, matched exactly when naming a partner.
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: UserId, handle: impl Into<String>) -> Self {
        Self {
            id,
            handle: handle.into(),
            created_at: Utc::now(),
        }
    }
}

/// `sessions`: a paired run between two distinct participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: SessionId,
    pub name: String,
    pub player_a: UserId,
    pub player_b: UserId,
    pub created_at: DateTime<Utc>,
    /// Touched by every roster or entry write in the session.
    pub updated_at: DateTime<Utc>,
}

impl SessionRow {
    pub fn new(name: impl Into<String>, player_a: UserId, player_b: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name: name.into(),
            player_a,
            player_b,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.player_a == user || self.player_b == user
    }
}

/// `rosters`: one per participant per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub id: RosterId,
    pub session_id: SessionId,
    pub player_id: UserId,
    pub trainer_name: String,
}

impl RosterRow {
    pub fn new(session_id: SessionId, player_id: UserId) -> Self {
        Self {
            id: RosterId::new(),
            session_id,
            player_id,
            trainer_name: String::new(),
        }
    }
}

/// A consistent read of one session: the session row plus every roster
/// with its slots filled, all taken at store revision `revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRead {
    pub revision: u64,
    pub session: SessionRow,
    pub rosters: Vec<Roster>,
}
