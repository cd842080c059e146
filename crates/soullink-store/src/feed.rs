//! The change feed.
//!
//! Every successful write emits one [`ChangeEvent`] on a broadcast channel.
//! Subscribers pick the rows they care about with a [`ChangeFilter`] and
//! read them through a [`ChangeStream`].
//!
//! ```text
//! put_entry ──→ revision 42 ──→ ChangeEvent{ Entry, Insert } ──┬─→ stream (entries, *)
//!                                                              └─→ stream (rosters, s1)  ✗ filtered
//! ```
//!
//! The feed only says *that* something changed, never *what* it changed
//! to. Subscribers re-read the rows they need.

use soullink_protocol::{EntryId, RosterId, SessionId, UserId};
use tokio::sync::broadcast;

/// The four tables of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Sessions,
    Rosters,
    Entries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// The row a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRef {
    Profile(UserId),
    Session(SessionId),
    Roster {
        roster_id: RosterId,
        session_id: SessionId,
    },
    /// Entry rows only know their roster; resolving the session is the
    /// subscriber's job.
    Entry {
        entry_id: EntryId,
        roster_id: RosterId,
    },
}

impl RowRef {
    pub fn table(&self) -> Table {
        match self {
            RowRef::Profile(_) => Table::Profiles,
            RowRef::Session(_) => Table::Sessions,
            RowRef::Roster { .. } => Table::Rosters,
            RowRef::Entry { .. } => Table::Entries,
        }
    }

    /// The session this row belongs to, when the row itself says so.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            RowRef::Session(id) => Some(*id),
            RowRef::Roster { session_id, .. } => Some(*session_id),
            RowRef::Profile(_) | RowRef::Entry { .. } => None,
        }
    }
}

/// One committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store revision after the write. Strictly increasing across events.
    pub revision: u64,
    pub op: ChangeOp,
    pub row: RowRef,
}

/// Selects events by table and, optionally, by session.
///
/// A session filter only matches rows that carry a session id, so
/// `ChangeFilter::table(Table::Entries).session(..)` matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    table: Table,
    session: Option<SessionId>,
}

impl ChangeFilter {
    /// Every change to `table`.
    pub fn table(table: Table) -> Self {
        Self {
            table,
            session: None,
        }
    }

    /// Narrows the filter to rows of one session.
    pub fn session(mut self, session_id: SessionId) -> Self {
        self.session = Some(session_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.row.table() != self.table {
            return false;
        }
        match self.session {
            None => true,
            Some(wanted) => event.row.session_id() == Some(wanted),
        }
    }
}

/// What a [`ChangeStream`] yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Event(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped. Anything
    /// derived from the feed should be re-read.
    Lagged(u64),
}

/// A filtered view of the change feed.
pub struct ChangeStream {
    filter: ChangeFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    pub(crate) fn new(
        filter: ChangeFilter,
        receiver: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        Self { filter, receiver }
    }

    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// Waits for the next matching change.
    ///
    /// Returns `None` once the store is gone. Cancel-safe: dropping the
    /// future loses no events.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    return Some(Change::Event(event));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Some(Change::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
