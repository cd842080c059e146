//! Session and roster logic for the Soul Link tracker.
//!
//! This crate is what the tracker actually *does*:
//!
//! 1. **Directory** ([`Directory`]): create, list, and delete paired
//!    sessions.
//! 2. **Rosters** ([`RosterStore`]): read both teams of a session; change
//!    trainer names, slots, and nicknames of your own team.
//! 3. **Notifier** ([`notifier::subscribe`]): push a fresh snapshot to a
//!    watcher after every change in the session.
//! 4. **Catalog and views** ([`catalog`], [`view`]): the species picker
//!    and the board, inventory, and stats view models.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← one AuthGateway per connection supplies the actor
//!     ↕
//! Roster Layer (this crate)  ← ownership checks, Soul Link rule, pushes
//!     ↕
//! Store Layer (below)  ← rows, atomic species constraint, change feed
//! ```
//!
//! Every operation takes the acting [`Identity`](soullink_protocol::Identity)
//! explicitly. Guests have no server-side data, so they are treated as
//! signed out here.

pub mod catalog;
mod directory;
mod error;
pub mod notifier;
mod roster;
pub mod view;

pub use directory::Directory;
pub use error::{DUPLICATE_MESSAGE, RosterError};
pub use notifier::{Notice, NoticeSender, Subscription};
pub use roster::RosterStore;
