//! In-memory [`TableStore`].
//!
//! All four tables live behind one async mutex. Every write takes the lock,
//! checks its constraints, applies the change, bumps the revision, and
//! publishes its change events before releasing the lock, so:
//!
//! - constraint checks can't race the write they guard, and
//! - events leave the feed in revision order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use soullink_protocol::{
    EntryDraft, EntryId, Roster, RosterEntry, RosterId, SessionId, Slot, SlotIndex, UserId,
};
use tokio::sync::{Mutex, broadcast};

use crate::constraints;
use crate::{
    ChangeEvent, ChangeFilter, ChangeOp, ChangeStream, Profile, RosterRow, RowRef, SessionRead,
    SessionRow, StoreError, TableStore,
};

/// Default capacity of the change feed. Subscribers further behind than
/// this see [`Change::Lagged`](crate::Change::Lagged).
const DEFAULT_FEED_CAPACITY: usize = 256;

/// Names a store operation, for [`MemoryStore::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertProfile,
    Profile,
    InsertSession,
    Session,
    SessionsFor,
    DeleteSession,
    InsertRosters,
    Roster,
    UpdateTrainerName,
    PutEntry,
    DeleteEntry,
    Entry,
    UpdateNickname,
    ReadSession,
}

#[derive(Default)]
struct Tables {
    revision: u64,
    profiles: HashMap<UserId, Profile>,
    sessions: HashMap<SessionId, SessionRow>,
    rosters: HashMap<RosterId, RosterRow>,
    entries: HashMap<EntryId, RosterEntry>,
    faults: HashSet<StoreOp>,
}

impl Tables {
    fn take_fault(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if self.faults.remove(&op) {
            tracing::debug!(?op, "injected store failure");
            return Err(StoreError::Unavailable(format!("injected failure in {op:?}")));
        }
        Ok(())
    }

    fn roster_ids_of(&self, session_id: SessionId) -> Vec<RosterId> {
        self.rosters
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.id)
            .collect()
    }

    fn entry_at(&self, roster_id: RosterId, slot: SlotIndex) -> Option<EntryId> {
        self.entries
            .values()
            .find(|e| e.roster_id == roster_id && e.slot == slot)
            .map(|e| e.id)
    }

    fn touch_session_of(&mut self, roster_id: RosterId) {
        let Some(session_id) = self.rosters.get(&roster_id).map(|r| r.session_id) else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.updated_at = Utc::now();
        }
    }

    fn assemble(&self, row: &RosterRow) -> Roster {
        let mut roster = Roster::empty(row.id, row.session_id, row.player_id, row.trainer_name.clone());
        for entry in self.entries.values().filter(|e| e.roster_id == row.id) {
            roster.slots[entry.slot.get()] = Slot::Occupied(entry.clone());
        }
        roster
    }
}

/// A [`TableStore`] held entirely in process memory.
///
/// Cloning is cheap; clones share the same tables and feed.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            feed,
        }
    }

    /// Makes the next call of `op` fail with [`StoreError::Unavailable`]
    /// without touching any table.
    pub async fn fail_next(&self, op: StoreOp) {
        self.tables.lock().await.faults.insert(op);
    }

    /// The current revision: the number of row changes committed so far.
    pub async fn revision(&self) -> u64 {
        self.tables.lock().await.revision
    }

    /// Bumps the revision and publishes one event. Call with the lock held.
    fn emit(&self, tables: &mut Tables, op: ChangeOp, row: RowRef) {
        tables.revision += 1;
        let event = ChangeEvent {
            revision: tables.revision,
            op,
            row,
        };
        // No subscribers is fine.
        let _ = self.feed.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for MemoryStore {
    async fn insert_profile(&self, profile: Profile) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::InsertProfile)?;

        if t.profiles.contains_key(&profile.id) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::PROFILE_ID,
            });
        }
        if t.profiles.values().any(|p| p.handle == profile.handle) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::PROFILE_HANDLE,
            });
        }

        let id = profile.id;
        t.profiles.insert(id, profile);
        self.emit(&mut t, ChangeOp::Insert, RowRef::Profile(id));
        Ok(())
    }

    async fn profile(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::Profile)?;
        Ok(t.profiles.get(&id).cloned())
    }

    async fn profile_by_handle(&self, handle: &str) -> Result<Option<Profile>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::Profile)?;
        Ok(t.profiles.values().find(|p| p.handle == handle).cloned())
    }

    async fn insert_session(&self, session: SessionRow) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::InsertSession)?;

        if t.sessions.contains_key(&session.id) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::SESSION_ID,
            });
        }
        if session.player_a == session.player_b {
            return Err(StoreError::CheckViolation(
                "session participants must be distinct".into(),
            ));
        }

        let id = session.id;
        t.sessions.insert(id, session);
        self.emit(&mut t, ChangeOp::Insert, RowRef::Session(id));
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<SessionRow>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::Session)?;
        Ok(t.sessions.get(&id).cloned())
    }

    async fn sessions_for(&self, user: UserId) -> Result<Vec<SessionRow>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::SessionsFor)?;

        let mut sessions: Vec<SessionRow> = t
            .sessions
            .values()
            .filter(|s| s.is_participant(user))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::DeleteSession)?;

        if !t.sessions.contains_key(&id) {
            return Ok(false);
        }

        let roster_ids = t.roster_ids_of(id);
        let entry_ids: Vec<(EntryId, RosterId)> = t
            .entries
            .values()
            .filter(|e| roster_ids.contains(&e.roster_id))
            .map(|e| (e.id, e.roster_id))
            .collect();

        for (entry_id, roster_id) in entry_ids {
            t.entries.remove(&entry_id);
            self.emit(&mut t, ChangeOp::Delete, RowRef::Entry { entry_id, roster_id });
        }
        for roster_id in roster_ids {
            t.rosters.remove(&roster_id);
            self.emit(
                &mut t,
                ChangeOp::Delete,
                RowRef::Roster {
                    roster_id,
                    session_id: id,
                },
            );
        }
        t.sessions.remove(&id);
        self.emit(&mut t, ChangeOp::Delete, RowRef::Session(id));

        tracing::debug!(session_id = %id, "session deleted with its rosters");
        Ok(true)
    }

    async fn insert_rosters(&self, rosters: Vec<RosterRow>) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::InsertRosters)?;

        // Check everything before writing anything.
        let mut seen = HashSet::new();
        for roster in &rosters {
            if !t.sessions.contains_key(&roster.session_id) {
                return Err(StoreError::NotFound { table: "sessions" });
            }
            let taken = t
                .rosters
                .values()
                .any(|r| r.session_id == roster.session_id && r.player_id == roster.player_id);
            if taken || !seen.insert((roster.session_id, roster.player_id)) {
                return Err(StoreError::UniqueViolation {
                    constraint: constraints::ROSTER_PLAYER,
                });
            }
        }

        for roster in rosters {
            let row = RowRef::Roster {
                roster_id: roster.id,
                session_id: roster.session_id,
            };
            t.rosters.insert(roster.id, roster);
            self.emit(&mut t, ChangeOp::Insert, row);
        }
        Ok(())
    }

    async fn roster(&self, id: RosterId) -> Result<Option<RosterRow>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::Roster)?;
        Ok(t.rosters.get(&id).cloned())
    }

    async fn update_trainer_name(&self, id: RosterId, name: String) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::UpdateTrainerName)?;

        let roster = t
            .rosters
            .get_mut(&id)
            .ok_or(StoreError::NotFound { table: "rosters" })?;
        roster.trainer_name = name;
        let row = RowRef::Roster {
            roster_id: id,
            session_id: roster.session_id,
        };

        t.touch_session_of(id);
        self.emit(&mut t, ChangeOp::Update, row);
        Ok(())
    }

    async fn put_entry(
        &self,
        roster_id: RosterId,
        slot: SlotIndex,
        draft: EntryDraft,
    ) -> Result<RosterEntry, StoreError> {
        draft.validate().map_err(StoreError::CheckViolation)?;
        let draft = draft.normalized();

        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::PutEntry)?;

        let session_id = t
            .rosters
            .get(&roster_id)
            .map(|r| r.session_id)
            .ok_or(StoreError::NotFound { table: "rosters" })?;

        let session_rosters = t.roster_ids_of(session_id);
        let duplicate = t.entries.values().any(|e| {
            session_rosters.contains(&e.roster_id) && e.species_name() == draft.species_name
        });
        if duplicate {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::ENTRY_SPECIES,
            });
        }

        if let Some(old) = t.entry_at(roster_id, slot) {
            t.entries.remove(&old);
            self.emit(
                &mut t,
                ChangeOp::Delete,
                RowRef::Entry {
                    entry_id: old,
                    roster_id,
                },
            );
        }

        let now = Utc::now();
        let entry = RosterEntry {
            id: EntryId::new(),
            roster_id,
            slot,
            details: draft,
            created_at: now,
            updated_at: now,
        };
        t.entries.insert(entry.id, entry.clone());
        t.touch_session_of(roster_id);
        self.emit(
            &mut t,
            ChangeOp::Insert,
            RowRef::Entry {
                entry_id: entry.id,
                roster_id,
            },
        );
        Ok(entry)
    }

    async fn delete_entry_at(
        &self,
        roster_id: RosterId,
        slot: SlotIndex,
    ) -> Result<Option<EntryId>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::DeleteEntry)?;

        if !t.rosters.contains_key(&roster_id) {
            return Err(StoreError::NotFound { table: "rosters" });
        }
        let Some(entry_id) = t.entry_at(roster_id, slot) else {
            return Ok(None);
        };

        t.entries.remove(&entry_id);
        t.touch_session_of(roster_id);
        self.emit(&mut t, ChangeOp::Delete, RowRef::Entry { entry_id, roster_id });
        Ok(Some(entry_id))
    }

    async fn entry(&self, id: EntryId) -> Result<Option<RosterEntry>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::Entry)?;
        Ok(t.entries.get(&id).cloned())
    }

    async fn update_nickname(
        &self,
        id: EntryId,
        nickname: Option<String>,
    ) -> Result<RosterEntry, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::UpdateNickname)?;

        let entry = t
            .entries
            .get_mut(&id)
            .ok_or(StoreError::NotFound { table: "entries" })?;
        entry.details.nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        entry.updated_at = Utc::now();
        let updated = entry.clone();

        t.touch_session_of(updated.roster_id);
        self.emit(
            &mut t,
            ChangeOp::Update,
            RowRef::Entry {
                entry_id: id,
                roster_id: updated.roster_id,
            },
        );
        Ok(updated)
    }

    async fn read_session(&self, id: SessionId) -> Result<Option<SessionRead>, StoreError> {
        let mut t = self.tables.lock().await;
        t.take_fault(StoreOp::ReadSession)?;

        let Some(session) = t.sessions.get(&id).cloned() else {
            return Ok(None);
        };

        let mut rows: Vec<&RosterRow> = t.rosters.values().filter(|r| r.session_id == id).collect();
        // Player A's roster first.
        rows.sort_by_key(|r| r.player_id != session.player_a);
        let rosters = rows.into_iter().map(|r| t.assemble(r)).collect();

        Ok(Some(SessionRead {
            revision: t.revision,
            session,
            rosters,
        }))
    }

    fn subscribe(&self, filter: ChangeFilter) -> ChangeStream {
        ChangeStream::new(filter, self.feed.subscribe())
    }
}
