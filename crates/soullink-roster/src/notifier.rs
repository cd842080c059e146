//! Change notifier: pushes a fresh roster snapshot whenever anything in a
//! watched session changes.
//!
//! Each subscription is its own Tokio task listening to three filtered
//! views of the store's change feed:
//!
//! ```text
//!                     ┌─ rosters  (session = S) ─────────────┐
//! store change feed ──┼─ entries  (any, resolved to session) ┼─→ re-read S ─→ sink
//!                     └─ sessions (session = S) ─ Delete ────┴─→ Closed ───→ sink, stop
//! ```
//!
//! Entry events only carry a roster id. The task remembers the watched
//! session's own rosters and asks the store about any other roster id.
//!
//! The feed says *that* something changed. The task always re-reads both
//! rosters and delivers the whole snapshot, stamped with the store revision
//! it was read at. A snapshot whose version isn't newer than the last one
//! sent is dropped, so the sink never goes backwards.

use std::collections::HashSet;

use soullink_protocol::{RosterId, RosterSnapshot, SessionId};
use soullink_store::{Change, ChangeFilter, ChangeOp, ChangeStream, RowRef, Table, TableStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::roster::load_snapshot;

/// What a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Both rosters as read after a change.
    Rosters(RosterSnapshot),
    /// The session was deleted. Nothing follows.
    Closed(SessionId),
}

/// Where a subscription delivers its notices.
pub type NoticeSender = mpsc::UnboundedSender<Notice>;

/// A running subscription. Dropping it unsubscribes.
pub struct Subscription {
    session_id: SessionId,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// `false` once the task has stopped (session closed or sink gone).
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the subscription. Same as dropping it.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts watching `session_id`.
///
/// Snapshots with a version at or below `last_seen` are never sent; pass
/// the version of a snapshot already shown to skip it, or 0.
///
/// The feed is subscribed before this returns and the task starts with a
/// re-read, so a change committed after the caller's own read of the
/// session is delivered even if it landed before this call.
pub fn subscribe<S: TableStore>(
    store: &S,
    session_id: SessionId,
    last_seen: u64,
    sink: NoticeSender,
) -> Subscription {
    let feeds = Feeds {
        rosters: store.subscribe(ChangeFilter::table(Table::Rosters).session(session_id)),
        entries: store.subscribe(ChangeFilter::table(Table::Entries)),
        sessions: store.subscribe(ChangeFilter::table(Table::Sessions).session(session_id)),
    };
    let notifier = Notifier {
        store: store.clone(),
        session_id,
        sink,
        own_rosters: HashSet::new(),
        last_version: last_seen,
    };
    let task = tokio::spawn(notifier.run(feeds));
    tracing::debug!(%session_id, "roster subscription started");
    Subscription { session_id, task }
}

struct Feeds {
    rosters: ChangeStream,
    entries: ChangeStream,
    sessions: ChangeStream,
}

/// What one turn of the select loop decided.
enum Step {
    Refresh,
    Entry(RosterId),
    Ignore,
    Closed,
    Stop,
}

struct Notifier<S: TableStore> {
    store: S,
    session_id: SessionId,
    sink: NoticeSender,
    /// Rosters known to belong to the watched session.
    own_rosters: HashSet<RosterId>,
    last_version: u64,
}

impl<S: TableStore> Notifier<S> {
    async fn run(mut self, mut feeds: Feeds) {
        // Catches writes that landed before the feeds were subscribed.
        let mut keep_going = self.refresh().await;
        while keep_going {
            let step = tokio::select! {
                Some(_) = feeds.rosters.next() => Step::Refresh,
                Some(change) = feeds.entries.next() => match change {
                    Change::Event(event) => match event.row {
                        RowRef::Entry { roster_id, .. } => Step::Entry(roster_id),
                        _ => Step::Ignore,
                    },
                    Change::Lagged(missed) => {
                        tracing::debug!(session_id = %self.session_id, missed, "entry feed lagged");
                        Step::Refresh
                    }
                },
                Some(change) = feeds.sessions.next() => match change {
                    Change::Event(event) if event.op == ChangeOp::Delete => Step::Closed,
                    _ => Step::Refresh,
                },
                _ = self.sink.closed() => Step::Stop,
            };

            keep_going = match step {
                Step::Refresh => self.refresh().await,
                Step::Entry(roster_id) => {
                    if self.concerns(roster_id).await {
                        self.refresh().await
                    } else {
                        true
                    }
                }
                Step::Ignore => true,
                Step::Closed => {
                    self.close();
                    false
                }
                Step::Stop => false,
            };
        }
        tracing::debug!(session_id = %self.session_id, "roster subscription stopped");
    }

    /// Whether `roster_id` belongs to the watched session.
    async fn concerns(&mut self, roster_id: RosterId) -> bool {
        if self.own_rosters.contains(&roster_id) {
            return true;
        }
        match self.store.roster(roster_id).await {
            Ok(Some(row)) if row.session_id == self.session_id => {
                self.own_rosters.insert(roster_id);
                true
            }
            Ok(Some(_)) => false,
            // Deleted before we looked; a session delete follows if it was ours.
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(%roster_id, error = %err, "roster lookup failed, refreshing anyway");
                true
            }
        }
    }

    /// Re-reads the session and sends the snapshot if it is newer than the
    /// last one sent. Returns `false` when the subscription should end.
    async fn refresh(&mut self) -> bool {
        let read = match self.store.read_session(self.session_id).await {
            Ok(Some(read)) => read,
            Ok(None) => {
                self.close();
                return false;
            }
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "snapshot re-fetch failed");
                return true;
            }
        };
        self.own_rosters
            .extend(read.rosters.iter().map(|roster| roster.id));

        let snapshot = match load_snapshot(read) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "incomplete session skipped");
                return true;
            }
        };
        if snapshot.version <= self.last_version {
            return true;
        }
        self.last_version = snapshot.version;
        self.sink.send(Notice::Rosters(snapshot)).is_ok()
    }

    fn close(&self) {
        tracing::debug!(session_id = %self.session_id, "watched session deleted");
        let _ = self.sink.send(Notice::Closed(self.session_id));
    }
}
