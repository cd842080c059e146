//! Per-connection handler: handshake, calls, and pushes.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Loop over two sources until the client leaves or goes idle:
//!      - inbound frames: heartbeats and calls (answered with a reply)
//!      - notifier notices for the watched session (sent as pushes)
//!
//! Every connection has its own [`AuthGateway`], so signing in on one tab
//! never affects another. Domain errors become `Reply::Failed` and never
//! end the connection.

use std::sync::Arc;
use std::time::Instant;

use soullink_auth::{AuthError, AuthGateway, IdentityProvider};
use soullink_protocol::{
    Codec, Envelope, ErrorCode, Identity, PROTOCOL_VERSION, Payload, ProtocolError, Push, Reply,
    Request, SystemMessage,
};
use soullink_roster::notifier::{self, Notice, NoticeSender};
use soullink_roster::{RosterError, Subscription, catalog};
use soullink_store::TableStore;
use soullink_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::SoulLinkError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P, S, C>>,
) -> Result<(), SoulLinkError>
where
    P: IdentityProvider,
    S: TableStore,
    C: Codec,
{
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &state, &start).await?;
    tracing::info!(%conn_id, "client connected");

    // --- Step 2: Message loop ---
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let mut client = Client {
        conn: &conn,
        state: &state,
        start,
        seq: 1,
        auth: AuthGateway::new(Arc::clone(&state.provider), state.store.clone()),
        pushes: push_tx,
        watching: None,
    };

    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            received = conn.recv() => {
                idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                if client.handle_frame(&data).await? {
                    break;
                }
            }
            Some(notice) = push_rx.recv() => {
                client.handle_notice(notice).await?;
            }
            () = &mut idle => {
                tracing::info!(%conn_id, "connection idle, closing");
                let _ = client
                    .send(Payload::System(SystemMessage::Disconnect {
                        reason: "idle timeout".into(),
                    }))
                    .await;
                break;
            }
        }
    }

    // Dropping the client drops its subscription, which stops the notifier.
    drop(client);
    let _ = conn.close().await;
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, send Ack.
async fn perform_handshake<P, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<P, S, C>,
    start: &Instant,
) -> Result<(), SoulLinkError>
where
    P: IdentityProvider,
    S: TableStore,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope = state.codec.decode(&data)?;

    let version = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version }) => version,
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0, start).await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            0,
            start,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let ack = Envelope::new(
        0,
        elapsed_ms(start),
        Payload::System(SystemMessage::HandshakeAck {
            server_time: elapsed_ms(start),
        }),
    );
    send_envelope(conn, &state.codec, &ack).await
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A failed call, ready to become `Reply::Failed`.
struct Failure {
    code: ErrorCode,
    message: String,
}

impl From<AuthError> for Failure {
    fn from(err: AuthError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<RosterError> for Failure {
    fn from(err: RosterError) -> Self {
        Self {
            code: err.code(),
            message: err.user_message(),
        }
    }
}

/// Per-connection state of the message loop.
struct Client<'a, P: IdentityProvider, S: TableStore, C: Codec> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<P, S, C>,
    start: Instant,
    seq: u64,
    auth: AuthGateway<P, S>,
    pushes: NoticeSender,
    /// At most one watched session per connection.
    watching: Option<Subscription>,
}

impl<P, S, C> Client<'_, P, S, C>
where
    P: IdentityProvider,
    S: TableStore,
    C: Codec,
{
    /// Handles one inbound frame. Returns `true` if the connection should
    /// close.
    async fn handle_frame(&mut self, data: &[u8]) -> Result<bool, SoulLinkError> {
        let envelope = match self.state.codec.decode(data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn.id(), error = %e, "failed to decode envelope");
                let seq = self.next_seq();
                send_error(
                    self.conn,
                    &self.state.codec,
                    400,
                    &format!("invalid message: {e}"),
                    seq,
                    &self.start,
                )
                .await?;
                return Ok(false);
            }
        };

        match envelope.payload {
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                let server_time = elapsed_ms(&self.start);
                self.send(Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time,
                }))
                .await?;
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(conn_id = %self.conn.id(), %reason, "client disconnected");
                return Ok(true);
            }
            Payload::Call { call_id, request } => {
                let op = request.name();
                let reply = match self.call(request).await {
                    Ok(reply) => reply,
                    Err(failure) => {
                        tracing::debug!(
                            conn_id = %self.conn.id(),
                            op,
                            code = ?failure.code,
                            message = %failure.message,
                            "call failed"
                        );
                        Reply::Failed {
                            code: failure.code,
                            message: failure.message,
                        }
                    }
                };
                self.send(Payload::Reply { call_id, reply }).await?;
            }
            _ => {
                tracing::debug!(conn_id = %self.conn.id(), "ignoring unexpected message");
            }
        }
        Ok(false)
    }

    async fn call(&mut self, request: Request) -> Result<Reply, Failure> {
        let state = self.state;
        match request {
            Request::SignIn { email, password } => {
                let (identity, token) = self.auth.sign_in(&email, &password).await?;
                self.watching = None;
                Ok(Reply::SignedIn { identity, token })
            }
            Request::SignUp {
                handle,
                email,
                password,
            } => {
                let (identity, token) = self.auth.sign_up(&handle, &email, &password).await?;
                self.watching = None;
                Ok(Reply::SignedIn { identity, token })
            }
            Request::SignOut => {
                self.auth.sign_out().await?;
                self.watching = None;
                Ok(Reply::Done)
            }
            Request::Resume { token } => {
                let identity = self.auth.resume(&token).await?;
                self.watching = None;
                Ok(Reply::SignedIn { identity, token })
            }
            Request::WhoAmI => Ok(Reply::Identity(self.auth.current())),
            Request::CreateSession {
                name,
                partner_handle,
            } => {
                let actor = self.actor()?;
                let summary = state
                    .directory
                    .create_session(&actor, &name, &partner_handle)
                    .await?;
                Ok(Reply::Session(summary))
            }
            Request::ListSessions => {
                let actor = self.actor()?;
                Ok(Reply::Sessions(state.directory.list_sessions(&actor).await?))
            }
            Request::DeleteSession { session_id } => {
                let actor = self.actor()?;
                state.directory.delete_session(&actor, session_id).await?;
                Ok(Reply::Done)
            }
            Request::GetRosters { session_id } => {
                let actor = self.actor()?;
                Ok(Reply::Rosters(state.rosters.get_roster(&actor, session_id).await?))
            }
            Request::SetTrainerName { roster_id, name } => {
                let actor = self.actor()?;
                state.rosters.set_trainer_name(&actor, roster_id, &name).await?;
                Ok(Reply::Done)
            }
            Request::AssignSpecies {
                roster_id,
                slot,
                entry,
            } => {
                let actor = self.actor()?;
                state
                    .rosters
                    .assign_species(&actor, roster_id, slot, entry)
                    .await?;
                Ok(Reply::Done)
            }
            Request::ClearSlot { roster_id, slot } => {
                let actor = self.actor()?;
                state.rosters.clear_slot(&actor, roster_id, slot).await?;
                Ok(Reply::Done)
            }
            Request::RenameEntry { entry_id, nickname } => {
                let actor = self.actor()?;
                state.rosters.rename_entry(&actor, entry_id, &nickname).await?;
                Ok(Reply::Done)
            }
            Request::Watch { session_id } => {
                let actor = self.actor()?;
                let snapshot = state.rosters.get_roster(&actor, session_id).await?;
                // Replacing the old subscription drops (and stops) it. The
                // notifier re-reads on start, so a write landing between this
                // read and the subscribe is still pushed.
                self.watching = Some(notifier::subscribe(
                    &state.store,
                    session_id,
                    snapshot.version,
                    self.pushes.clone(),
                ));
                tracing::debug!(conn_id = %self.conn.id(), %session_id, "watching session");
                Ok(Reply::Rosters(snapshot))
            }
            Request::Unwatch => {
                self.watching = None;
                Ok(Reply::Done)
            }
            Request::Catalog => Ok(Reply::Catalog(catalog::all().to_vec())),
        }
    }

    /// Forwards a notice for the watched session as a push.
    async fn handle_notice(&mut self, notice: Notice) -> Result<(), SoulLinkError> {
        let watched = self.watching.as_ref().map(Subscription::session_id);
        match notice {
            Notice::Rosters(snapshot) if watched == Some(snapshot.session_id) => {
                self.send(Payload::Push(Push::Rosters(snapshot))).await
            }
            Notice::Closed(session_id) if watched == Some(session_id) => {
                self.watching = None;
                self.send(Payload::Push(Push::SessionClosed { session_id }))
                    .await
            }
            // Left over from a subscription that has since been replaced.
            _ => Ok(()),
        }
    }

    fn actor(&self) -> Result<Identity, Failure> {
        Ok(self.auth.require_account()?)
    }

    async fn send(&mut self, payload: Payload) -> Result<(), SoulLinkError> {
        let envelope = Envelope::new(self.next_seq(), elapsed_ms(&self.start), payload);
        send_envelope(self.conn, &self.state.codec, &envelope).await
    }

    /// Increments and returns the next sequence number.
    fn next_seq(&mut self) -> u64 {
        let current = self.seq;
        self.seq += 1;
        current
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Encodes and sends one envelope, as a text frame when the codec is text.
async fn send_envelope(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    envelope: &Envelope,
) -> Result<(), SoulLinkError> {
    let bytes = codec.encode(envelope)?;
    if codec.is_text() {
        let text = String::from_utf8(bytes).map_err(|_| {
            ProtocolError::InvalidMessage("text codec produced invalid UTF-8".into())
        })?;
        conn.send_text(&text).await?;
    } else {
        conn.send(&bytes).await?;
    }
    Ok(())
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
    start: &Instant,
) -> Result<(), SoulLinkError> {
    let envelope = Envelope::new(
        seq,
        elapsed_ms(start),
        Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }),
    );
    send_envelope(conn, codec, &envelope).await
}

fn elapsed_ms(start: &Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
