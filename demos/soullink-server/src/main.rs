//! Runs a Soul Link server backed by the in-memory store.
//!
//! `SOULLINK_BIND`, `SOULLINK_HANDSHAKE_TIMEOUT_SECS` and
//! `SOULLINK_IDLE_TIMEOUT_SECS` configure the server, `RUST_LOG` the logs.
//! Set `SOULLINK_SEED=1` to start with two trainers, `red` and `blue`
//! (password `pokeball`), already linked in one session.

use std::sync::Arc;

use soullink::prelude::*;
use tracing_subscriber::EnvFilter;

const SEED_PASSWORD: &str = "pokeball";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = MemoryStore::new();

    if std::env::var("SOULLINK_SEED").is_ok_and(|v| v == "1") {
        seed(&provider, &store).await?;
    }

    tracing::info!(bind = %config.bind, "starting soullink server");
    let server = SoulLinkServer::<MemoryIdentityProvider, MemoryStore, JsonCodec>::builder()
        .config(config)
        .build(provider, store)
        .await?;

    server.run().await?;
    Ok(())
}

/// Signs up the demo trainers and links them in a session.
async fn seed(
    provider: &Arc<MemoryIdentityProvider>,
    store: &MemoryStore,
) -> Result<(), SoulLinkError> {
    let red = AuthGateway::new(Arc::clone(provider), store.clone());
    let (red_identity, _) = red
        .sign_up("red", "red@kanto.org", SEED_PASSWORD)
        .await?;

    let blue = AuthGateway::new(Arc::clone(provider), store.clone());
    blue.sign_up("blue", "blue@kanto.org", SEED_PASSWORD).await?;

    let session = Directory::new(store.clone())
        .create_session(&red_identity, "Kanto Soul Link", "blue")
        .await?;
    tracing::info!(session_id = %session.id, "seeded demo session");
    Ok(())
}
