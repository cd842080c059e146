//! # Soul Link
//!
//! A shared tracker for two-player Pokémon "Soul Link" runs.
//!
//! Two trainers pair up in a session, each keeps a six-slot roster, and a
//! species caught by one can't be caught by the other. Both see every
//! change as it happens.
//!
//! This crate is the server: a WebSocket endpoint speaking the envelope
//! protocol of [`soullink_protocol`], with one task per connection.
//!
//! ```text
//! client ──ws──→ Transport ──→ handler ──→ AuthGateway (per connection)
//!                                   │
//!                                   ├──→ Directory / RosterStore ──→ TableStore
//!                                   └──← notifier (pushes) ←── change feed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use soullink::prelude::*;
//!
//! # async fn run() -> Result<(), SoulLinkError> {
//! let server = SoulLinkServer::<MemoryIdentityProvider, MemoryStore, JsonCodec>::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build(Arc::new(MemoryIdentityProvider::new()), MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ENV_BIND, ENV_HANDSHAKE_TIMEOUT, ENV_IDLE_TIMEOUT, ServerConfig};
pub use error::SoulLinkError;
pub use server::{SoulLinkServer, SoulLinkServerBuilder};

pub mod prelude {
    pub use crate::{ServerConfig, SoulLinkError, SoulLinkServer, SoulLinkServerBuilder};

    pub use soullink_auth::{AuthGateway, IdentityProvider, MemoryIdentityProvider};
    pub use soullink_protocol::{
        Codec, EntryDraft, Envelope, ErrorCode, Identity, JsonCodec, PROTOCOL_VERSION, Payload,
        Push, Reply, Request, RosterSnapshot, SessionId, SlotIndex, SystemMessage,
    };
    pub use soullink_roster::view::SnapshotTracker;
    pub use soullink_roster::{Directory, RosterError, RosterStore, catalog};
    pub use soullink_store::{MemoryStore, TableStore};
}
