//! The session directory: creating, listing, and deleting paired runs.
//!
//! A session always has exactly two participants and, once created, one
//! roster for each. Creation is two store writes (session, then both
//! rosters); if the second fails the first is undone so no session is
//! left without rosters.
//!
//! ```text
//! create_session("Kanto run", "misty")
//!     │
//!     ├─→ profile_by_handle("misty")      PartnerNotFound if missing
//!     ├─→ insert_session(a, b)
//!     └─→ insert_rosters([a, b]) ──✗──→ delete_session (rollback)
//! ```

use soullink_protocol::{Identity, SessionId, SessionSummary, UserId};
use soullink_store::{RosterRow, SessionRow, TableStore};

use crate::RosterError;

/// Session-level operations for one store.
#[derive(Clone)]
pub struct Directory<S: TableStore> {
    store: S,
}

impl<S: TableStore> Directory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a session between `actor` and the trainer with
    /// `partner_handle`, plus an empty roster for each.
    pub async fn create_session(
        &self,
        actor: &Identity,
        name: &str,
        partner_handle: &str,
    ) -> Result<SessionSummary, RosterError> {
        let actor_id = require_account(actor)?;
        let name = name.trim();
        let partner_handle = partner_handle.trim();
        if name.is_empty() {
            return Err(RosterError::InvalidInput("session name is empty".into()));
        }
        if partner_handle.is_empty() {
            return Err(RosterError::InvalidInput("partner handle is empty".into()));
        }

        let partner = self
            .store
            .profile_by_handle(partner_handle)
            .await?
            .ok_or_else(|| RosterError::PartnerNotFound(partner_handle.to_string()))?;
        if partner.id == actor_id {
            return Err(RosterError::Conflict(
                "you can't start a session with yourself".into(),
            ));
        }

        let session = SessionRow::new(name, actor_id, partner.id);
        let session_id = session.id;
        self.store.insert_session(session.clone()).await?;

        let rosters = vec![
            RosterRow::new(session_id, actor_id),
            RosterRow::new(session_id, partner.id),
        ];
        if let Err(err) = self.store.insert_rosters(rosters).await {
            tracing::warn!(
                %session_id,
                error = %err,
                "roster creation failed, rolling back session"
            );
            if let Err(rollback) = self.store.delete_session(session_id).await {
                tracing::error!(%session_id, error = %rollback, "session rollback failed");
            }
            return Err(err.into());
        }

        tracing::info!(%session_id, user_id = %actor_id, partner_id = %partner.id, "session created");

        Ok(summarize(
            &session,
            actor_id,
            Some(actor.handle.clone()),
            Some(partner.handle),
        ))
    }

    /// Sessions `actor` takes part in, most recently updated first, each
    /// annotated with both handles.
    pub async fn list_sessions(&self, actor: &Identity) -> Result<Vec<SessionSummary>, RosterError> {
        let actor_id = require_account(actor)?;
        let rows = self.store.sessions_for(actor_id).await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let a = self.handle_of(row.player_a).await?;
            let b = self.handle_of(row.player_b).await?;
            summaries.push(summarize(row, actor_id, a, b));
        }
        Ok(summaries)
    }

    /// Deletes a session, its rosters, and their entries. Participants only.
    pub async fn delete_session(
        &self,
        actor: &Identity,
        session_id: SessionId,
    ) -> Result<(), RosterError> {
        let actor_id = require_account(actor)?;
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(RosterError::NotFound("session"))?;
        if !session.is_participant(actor_id) {
            return Err(RosterError::Unauthorized);
        }

        // A concurrent delete by the partner is fine; the end state is the same.
        self.store.delete_session(session_id).await?;
        tracing::info!(%session_id, user_id = %actor_id, "session deleted");
        Ok(())
    }

    async fn handle_of(&self, user: UserId) -> Result<Option<String>, RosterError> {
        Ok(self.store.profile(user).await?.map(|p| p.handle))
    }
}

/// The acting user's id, or `Unauthenticated` for guests.
pub(crate) fn require_account(actor: &Identity) -> Result<UserId, RosterError> {
    if actor.is_guest() {
        return Err(RosterError::Unauthenticated);
    }
    Ok(actor.id)
}

fn summarize(
    row: &SessionRow,
    viewer: UserId,
    player_a_handle: Option<String>,
    player_b_handle: Option<String>,
) -> SessionSummary {
    let partner_handle = if row.player_a == viewer {
        player_b_handle.clone()
    } else {
        player_a_handle.clone()
    };
    SessionSummary {
        id: row.id,
        name: row.name.clone(),
        player_a: row.player_a,
        player_b: row.player_b,
        player_a_handle,
        player_b_handle,
        partner_handle,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
