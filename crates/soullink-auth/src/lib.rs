//! Identity for the Soul Link tracker.
//!
//! This crate answers "who is making this request?":
//!
//! 1. **Accounts**: the external [`IdentityProvider`] (email/password,
//!    access tokens) with an in-memory implementation.
//! 2. **The gateway**: [`AuthGateway`], one per connection, publishing the
//!    current [`Identity`](soullink_protocol::Identity) reactively.
//! 3. **Guest mode**: a client-side identity and roster pair kept in
//!    cookies ([`GuestStore`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Roster logic (above)  ← asks the gateway for the acting identity
//!     ↕
//! Auth Layer (this crate)  ← accounts, profiles, guest cookies
//!     ↕
//! Store Layer (below)  ← profile rows (unique handles)
//! ```

#![allow(async_fn_in_trait)]

mod cookie;
mod error;
mod gateway;
mod persistence;
mod provider;

pub use cookie::{Cookie, CookieJar, GuestCookieConfig, MemoryCookieJar};
pub use error::AuthError;
pub use gateway::{AuthGateway, IdentityWatch, MAX_HANDLE_LEN};
pub use persistence::{
    GUEST_COOKIE, GUEST_TEAMS_COOKIE, GuestStore, GuestTeam, TeamPair, user_teams_cookie,
};
pub use provider::{
    AuthUser, Credentials, IdentityProvider, MIN_PASSWORD_LEN, MemoryIdentityProvider,
};
