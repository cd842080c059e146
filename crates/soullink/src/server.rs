//! `SoulLinkServer` builder and server loop.
//!
//! This is the entry point for running a tracker server. It ties together
//! all the layers: transport → protocol → auth → roster → store.

use std::net::SocketAddr;
use std::sync::Arc;

use soullink_auth::IdentityProvider;
use soullink_protocol::{Codec, JsonCodec};
use soullink_roster::{Directory, RosterStore};
use soullink_store::TableStore;
use soullink_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ServerConfig, SoulLinkError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Everything
/// mutable lives in the store, so no lock is needed here.
pub(crate) struct ServerState<P: IdentityProvider, S: TableStore, C: Codec> {
    pub(crate) provider: Arc<P>,
    pub(crate) store: S,
    pub(crate) directory: Directory<S>,
    pub(crate) rosters: RosterStore<S>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Soul Link server.
///
/// # Example
///
/// ```rust,ignore
/// use soullink::prelude::*;
///
/// let server = SoulLinkServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(Arc::new(MemoryIdentityProvider::new()), MemoryStore::new())
///     .await?;
/// server.run().await
/// ```
pub struct SoulLinkServerBuilder {
    config: ServerConfig,
}

impl SoulLinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Replaces the whole configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<P, S>(
        self,
        provider: Arc<P>,
        store: S,
    ) -> Result<SoulLinkServer<P, S, JsonCodec>, SoulLinkError>
    where
        P: IdentityProvider,
        S: TableStore,
    {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;

        let state = Arc::new(ServerState {
            provider,
            directory: Directory::new(store.clone()),
            rosters: RosterStore::new(store.clone()),
            store,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(SoulLinkServer { transport, state })
    }
}

impl Default for SoulLinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Soul Link server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SoulLinkServer<P: IdentityProvider, S: TableStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, S, C>>,
}

impl<P, S, C> SoulLinkServer<P, S, C>
where
    P: IdentityProvider,
    S: TableStore,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> SoulLinkServerBuilder {
        SoulLinkServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SoulLinkError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), SoulLinkError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Soul Link server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
