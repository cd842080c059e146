//! Table storage for the Soul Link tracker.
//!
//! The tracker keeps its shared state in four tables (profiles, sessions,
//! rosters, entries) behind the [`TableStore`] trait, plus a change feed
//! that tells subscribers which rows were written.
//!
//! # How it fits in the stack
//!
//! ```text
//! Roster logic (above)  ← directory, roster mutators, change notifier
//!     ↕
//! Store Layer (this crate)  ← rows, constraints, change feed
//!     ↕
//! Protocol Layer (below)  ← ids, RosterEntry, EntryDraft
//! ```
//!
//! [`MemoryStore`] is the in-process implementation used by the server
//! binary and the tests. A hosted database would implement the same trait.

#![allow(async_fn_in_trait)]

mod error;
mod feed;
mod memory;
mod rows;

pub use error::StoreError;
pub use feed::{Change, ChangeEvent, ChangeFilter, ChangeOp, ChangeStream, RowRef, Table};
pub use memory::{MemoryStore, StoreOp};
pub use rows::{Profile, RosterRow, SessionRead, SessionRow};

use std::future::Future;

use soullink_protocol::{EntryDraft, EntryId, RosterEntry, RosterId, SessionId, SlotIndex, UserId};

/// Names of the uniqueness constraints a store enforces, as reported in
/// [`StoreError::UniqueViolation`].
pub mod constraints {
    /// `profiles.id`
    pub const PROFILE_ID: &str = "profiles_pkey";
    /// `profiles.handle`
    pub const PROFILE_HANDLE: &str = "profiles_handle_key";
    /// `sessions.id`
    pub const SESSION_ID: &str = "sessions_pkey";
    /// One roster per participant per session.
    pub const ROSTER_PLAYER: &str = "rosters_session_player_key";
    /// The Soul Link rule: a species name appears at most once across all
    /// rosters of a session.
    pub const ENTRY_SPECIES: &str = "entries_session_species_key";
}

/// The relational store the tracker runs on.
///
/// Implementations must be cheap to clone (an `Arc` inside) and must
/// apply each write atomically: a write either happens completely, with
/// one [`ChangeEvent`] per touched row, or not at all.
///
/// Every method returns [`StoreError::Unavailable`] on a transient failure.
pub trait TableStore: Clone + Send + Sync + 'static {
    // -- profiles ----------------------------------------------------------

    /// Inserts a profile.
    ///
    /// # Errors
    /// [`StoreError::UniqueViolation`] on [`constraints::PROFILE_ID`] or
    /// [`constraints::PROFILE_HANDLE`].
    fn insert_profile(
        &self,
        profile: Profile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn profile(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    /// Exact, case-sensitive handle lookup.
    fn profile_by_handle(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    // -- sessions ----------------------------------------------------------

    fn insert_session(
        &self,
        session: SessionRow,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<SessionRow>, StoreError>> + Send;

    /// Sessions where `user` is either participant, most recently updated
    /// first.
    fn sessions_for(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<SessionRow>, StoreError>> + Send;

    /// Deletes a session together with its rosters and their entries.
    /// Returns `false` if there was no such session.
    fn delete_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // -- rosters -----------------------------------------------------------

    /// Inserts all rosters or none.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if a roster names a missing session;
    /// [`StoreError::UniqueViolation`] on [`constraints::ROSTER_PLAYER`].
    fn insert_rosters(
        &self,
        rosters: Vec<RosterRow>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn roster(
        &self,
        id: RosterId,
    ) -> impl Future<Output = Result<Option<RosterRow>, StoreError>> + Send;

    fn update_trainer_name(
        &self,
        id: RosterId,
        name: String,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- entries -----------------------------------------------------------

    /// Puts a new entry into `slot`, replacing whatever was there. A
    /// replaced entry publishes a `Delete` for its row before the `Insert`.
    ///
    /// The species check and the write happen as one step: if any roster
    /// of the same session (the target slot included) already holds an
    /// entry with the draft's species name, nothing changes and
    /// [`constraints::ENTRY_SPECIES`] is reported.
    ///
    /// # Errors
    /// [`StoreError::CheckViolation`] if the draft fails
    /// [`EntryDraft::validate`]; [`StoreError::NotFound`] for a missing
    /// roster.
    fn put_entry(
        &self,
        roster_id: RosterId,
        slot: SlotIndex,
        draft: EntryDraft,
    ) -> impl Future<Output = Result<RosterEntry, StoreError>> + Send;

    /// Removes the entry in `slot`, if any, and returns its id.
    fn delete_entry_at(
        &self,
        roster_id: RosterId,
        slot: SlotIndex,
    ) -> impl Future<Output = Result<Option<EntryId>, StoreError>> + Send;

    fn entry(
        &self,
        id: EntryId,
    ) -> impl Future<Output = Result<Option<RosterEntry>, StoreError>> + Send;

    /// Sets or clears (`None`) an entry's nickname.
    fn update_nickname(
        &self,
        id: EntryId,
        nickname: Option<String>,
    ) -> impl Future<Output = Result<RosterEntry, StoreError>> + Send;

    // -- reads & feed ------------------------------------------------------

    /// Reads a session and all of its rosters at a single revision.
    fn read_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<SessionRead>, StoreError>> + Send;

    /// Subscribes to committed changes matching `filter`.
    fn subscribe(&self, filter: ChangeFilter) -> ChangeStream;
}
