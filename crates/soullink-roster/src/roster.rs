//! Reading and editing the two rosters of a session.
//!
//! Every mutator resolves the target roster first and checks that the
//! acting user owns it. Only then does it write, so a rejected call
//! leaves the store untouched.
//!
//! The Soul Link rule (one species per session) is enforced by the
//! store's `put_entry`, which checks and writes under one lock. This layer
//! only translates the constraint violation into
//! [`RosterError::DuplicateInSession`].

use soullink_protocol::{
    EntryDraft, EntryId, Identity, RosterEntry, RosterId, RosterSnapshot, SessionId, SlotIndex,
};
use soullink_store::{RosterRow, TableStore, constraints};

use crate::RosterError;
use crate::directory::require_account;

/// Roster reads and writes for one store.
#[derive(Clone)]
pub struct RosterStore<S: TableStore> {
    store: S,
}

impl<S: TableStore> RosterStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Both rosters of a session, six slots each, read at one store
    /// revision. The snapshot's `version` is that revision.
    ///
    /// Only participants may read. A session that lost a roster reports
    /// [`RosterError::Conflict`] instead of a half-empty board.
    pub async fn get_roster(
        &self,
        actor: &Identity,
        session_id: SessionId,
    ) -> Result<RosterSnapshot, RosterError> {
        let actor_id = require_account(actor)?;
        let read = self
            .store
            .read_session(session_id)
            .await?
            .ok_or(RosterError::NotFound("session"))?;
        if !read.session.is_participant(actor_id) {
            return Err(RosterError::Unauthorized);
        }
        load_snapshot(read)
    }

    pub async fn set_trainer_name(
        &self,
        actor: &Identity,
        roster_id: RosterId,
        name: &str,
    ) -> Result<(), RosterError> {
        self.owned_roster(actor, roster_id).await?;
        self.store
            .update_trainer_name(roster_id, name.trim().to_string())
            .await?;
        tracing::debug!(%roster_id, "trainer name updated");
        Ok(())
    }

    /// Puts `draft` into `slot`, replacing whatever was there.
    ///
    /// Fails with [`RosterError::DuplicateInSession`] if any roster of the
    /// session already holds the species, the target slot included.
    pub async fn assign_species(
        &self,
        actor: &Identity,
        roster_id: RosterId,
        slot: SlotIndex,
        draft: EntryDraft,
    ) -> Result<RosterEntry, RosterError> {
        let roster = self.owned_roster(actor, roster_id).await?;

        let ivs = draft.ivs.iv_violations();
        let evs = draft.evs.ev_violations();
        if !ivs.is_empty() || !evs.is_empty() {
            tracing::warn!(
                %roster_id,
                species = %draft.species_name,
                ?ivs,
                ?evs,
                "stat values out of range, storing as given"
            );
        }

        let species = draft.species_name.trim().to_string();
        match self.store.put_entry(roster_id, slot, draft).await {
            Ok(entry) => {
                tracing::info!(
                    session_id = %roster.session_id,
                    %roster_id,
                    slot = slot.get(),
                    %species,
                    "species assigned"
                );
                Ok(entry)
            }
            Err(err) if err.is_unique_violation(constraints::ENTRY_SPECIES) => {
                tracing::debug!(session_id = %roster.session_id, %species, "duplicate species rejected");
                Err(RosterError::DuplicateInSession { species })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Empties `slot`. Clearing an empty slot succeeds.
    pub async fn clear_slot(
        &self,
        actor: &Identity,
        roster_id: RosterId,
        slot: SlotIndex,
    ) -> Result<(), RosterError> {
        self.owned_roster(actor, roster_id).await?;
        if let Some(entry_id) = self.store.delete_entry_at(roster_id, slot).await? {
            tracing::debug!(%roster_id, %entry_id, "slot cleared");
        }
        Ok(())
    }

    /// Sets an entry's nickname. A blank nickname clears it.
    pub async fn rename_entry(
        &self,
        actor: &Identity,
        entry_id: EntryId,
        nickname: &str,
    ) -> Result<RosterEntry, RosterError> {
        let entry = self
            .store
            .entry(entry_id)
            .await?
            .ok_or(RosterError::NotFound("entry"))?;
        self.owned_roster(actor, entry.roster_id).await?;

        let nickname = Some(nickname.trim().to_string()).filter(|n| !n.is_empty());
        Ok(self.store.update_nickname(entry_id, nickname).await?)
    }

    async fn owned_roster(
        &self,
        actor: &Identity,
        roster_id: RosterId,
    ) -> Result<RosterRow, RosterError> {
        let actor_id = require_account(actor)?;
        let roster = self
            .store
            .roster(roster_id)
            .await?
            .ok_or(RosterError::NotFound("roster"))?;
        if roster.player_id != actor_id {
            tracing::debug!(%roster_id, user_id = %actor_id, "write to foreign roster refused");
            return Err(RosterError::Unauthorized);
        }
        Ok(roster)
    }
}

/// Turns a consistent session read into a snapshot.
pub(crate) fn load_snapshot(read: soullink_store::SessionRead) -> Result<RosterSnapshot, RosterError> {
    if read.rosters.len() < 2 {
        return Err(RosterError::Conflict(format!(
            "session {} has {} of 2 rosters",
            read.session.id,
            read.rosters.len()
        )));
    }
    Ok(RosterSnapshot {
        session_id: read.session.id,
        version: read.revision,
        rosters: read.rosters,
    })
}
