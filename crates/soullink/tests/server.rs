//! Integration tests for the Soul Link server, handler, and full connection
//! flow, driven by real WebSocket clients.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use soullink::prelude::*;
use soullink_protocol::{Identity, SessionSummary};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server_with(config: ServerConfig) -> String {
    let server = SoulLinkServerBuilder::new()
        .config(config.with_bind("127.0.0.1:0"))
        .build(Arc::new(MemoryIdentityProvider::new()), MemoryStore::new())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(ServerConfig::default()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

fn encode_envelope(envelope: &Envelope) -> Message {
    let text = serde_json::to_string(envelope).expect("encode");
    Message::Text(text.into())
}

/// Next data frame as an envelope; `None` once the server closed.
async fn recv_envelope(ws: &mut ClientWs) -> Option<Envelope> {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next()).await.expect("timed out")?;
        match msg {
            Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                return Some(serde_json::from_slice(&msg.into_data()).expect("decode"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn send_system(ws: &mut ClientWs, msg: SystemMessage) {
    let env = Envelope::new(0, 0, Payload::System(msg));
    ws.send(encode_envelope(&env)).await.expect("send");
}

/// Sends a handshake and returns the HandshakeAck envelope.
async fn handshake(ws: &mut ClientWs) -> Envelope {
    send_system(ws, SystemMessage::Handshake {
        version: PROTOCOL_VERSION,
    })
    .await;
    recv_envelope(ws).await.expect("recv ack")
}

/// A handshaken connection that keeps pushes aside while waiting for
/// replies.
struct Client {
    ws: ClientWs,
    next_call: u64,
    pushes: VecDeque<Push>,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let mut ws = connect(addr).await;
        handshake(&mut ws).await;
        Self {
            ws,
            next_call: 1,
            pushes: VecDeque::new(),
        }
    }

    async fn call(&mut self, request: Request) -> Reply {
        let call_id = self.next_call;
        self.next_call += 1;
        let env = Envelope::new(call_id, 0, Payload::Call { call_id, request });
        self.ws.send(encode_envelope(&env)).await.expect("send call");

        loop {
            let env = recv_envelope(&mut self.ws).await.expect("connection closed");
            match env.payload {
                Payload::Reply { call_id: id, reply } if id == call_id => return reply,
                Payload::Push(push) => self.pushes.push_back(push),
                other => panic!("unexpected frame while waiting for reply: {other:?}"),
            }
        }
    }

    async fn push(&mut self) -> Push {
        if let Some(push) = self.pushes.pop_front() {
            return push;
        }
        loop {
            let env = recv_envelope(&mut self.ws).await.expect("connection closed");
            if let Payload::Push(push) = env.payload {
                return push;
            }
        }
    }

    async fn sign_up(&mut self, handle: &str) -> (Identity, String) {
        let reply = self
            .call(Request::SignUp {
                handle: handle.into(),
                email: format!("{handle}@kanto.org"),
                password: "pokeball".into(),
            })
            .await;
        match reply {
            Reply::SignedIn { identity, token } => (identity, token),
            other => panic!("expected SignedIn, got {other:?}"),
        }
    }
}

fn expect_failed(reply: Reply) -> (ErrorCode, String) {
    match reply {
        Reply::Failed { code, message } => (code, message),
        other => panic!("expected Failed, got {other:?}"),
    }
}

fn expect_rosters(reply: Reply) -> RosterSnapshot {
    match reply {
        Reply::Rosters(snapshot) => snapshot,
        other => panic!("expected Rosters, got {other:?}"),
    }
}

fn species(name: &str) -> EntryDraft {
    catalog::by_name(name).expect("catalog species").to_draft()
}

fn slot(i: u8) -> SlotIndex {
    SlotIndex::new(i).unwrap()
}

/// Two signed-up trainers in one session, both watching it.
struct Pair {
    red: Client,
    blue: Client,
    red_id: Identity,
    blue_id: Identity,
    session: SessionSummary,
}

async fn pair(addr: &str) -> Pair {
    let mut red = Client::connect(addr).await;
    let mut blue = Client::connect(addr).await;
    let (red_id, _) = red.sign_up("red").await;
    let (blue_id, _) = blue.sign_up("blue").await;

    let session = match red
        .call(Request::CreateSession {
            name: "Kanto".into(),
            partner_handle: "blue".into(),
        })
        .await
    {
        Reply::Session(summary) => summary,
        other => panic!("expected Session, got {other:?}"),
    };
    expect_rosters(red.call(Request::Watch { session_id: session.id }).await);
    expect_rosters(blue.call(Request::Watch { session_id: session.id }).await);

    Pair {
        red,
        blue,
        red_id,
        blue_id,
        session,
    }
}

// =========================================================================
// Connection
// =========================================================================

#[tokio::test]
async fn test_handshake_success() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let ack = handshake(&mut ws).await;
    assert!(matches!(
        ack.payload,
        Payload::System(SystemMessage::HandshakeAck { .. })
    ));
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_system(&mut ws, SystemMessage::Handshake { version: 999 }).await;

    match recv_envelope(&mut ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::Error { code, .. })) => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_before_handshake_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let env = Envelope::new(0, 0, Payload::Call {
        call_id: 1,
        request: Request::Catalog,
    });
    ws.send(encode_envelope(&env)).await.expect("send");

    match recv_envelope(&mut ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::Error { code, .. })) => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_system(&mut ws, SystemMessage::Heartbeat { client_time: 12345 }).await;

    match recv_envelope(&mut ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::HeartbeatAck { client_time, .. })) => {
            assert_eq!(client_time, 12345);
        }
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    ws.send(Message::Text("{ not json".into())).await.expect("send");
    match recv_envelope(&mut ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::Error { code, .. })) => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }

    send_system(&mut ws, SystemMessage::Heartbeat { client_time: 1 }).await;
    assert!(matches!(
        recv_envelope(&mut ws).await.map(|e| e.payload),
        Some(Payload::System(SystemMessage::HeartbeatAck { .. }))
    ));
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_system(&mut ws, SystemMessage::Disconnect { reason: "bye".into() }).await;

    assert!(recv_envelope(&mut ws).await.is_none());
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr =
        start_server_with(ServerConfig::default().with_idle_timeout(Duration::from_millis(200)))
            .await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    match recv_envelope(&mut ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::Disconnect { reason })) => {
            assert_eq!(reason, "idle timeout");
        }
        other => panic!("expected Disconnect, got {other:?}"),
    }
    assert!(recv_envelope(&mut ws).await.is_none());
}

// =========================================================================
// Calls
// =========================================================================

#[tokio::test]
async fn test_calls_require_sign_in() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    let (code, _) = expect_failed(client.call(Request::ListSessions).await);
    assert_eq!(code, ErrorCode::Unauthenticated);
    assert_eq!(client.call(Request::WhoAmI).await, Reply::Identity(None));
}

#[tokio::test]
async fn test_catalog_lists_bundled_species() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    match client.call(Request::Catalog).await {
        Reply::Catalog(species) => {
            assert_eq!(species.len(), 18);
            assert!(species.iter().any(|s| s.name == "Pikachu"));
        }
        other => panic!("expected Catalog, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sign_up_taken_handle() {
    let addr = start_server().await;
    let mut first = Client::connect(&addr).await;
    first.sign_up("ash").await;

    let mut second = Client::connect(&addr).await;
    let reply = second
        .call(Request::SignUp {
            handle: "ash".into(),
            email: "other@kanto.org".into(),
            password: "pokeball".into(),
        })
        .await;
    let (code, _) = expect_failed(reply);
    assert_eq!(code, ErrorCode::HandleTaken);
}

#[tokio::test]
async fn test_resume_restores_identity_on_new_connection() {
    let addr = start_server().await;
    let mut first = Client::connect(&addr).await;
    let (identity, token) = first.sign_up("misty").await;

    let mut second = Client::connect(&addr).await;
    let resumed = second.call(Request::Resume { token }).await;
    assert!(matches!(resumed, Reply::SignedIn { identity: ref i, .. } if *i == identity));
    assert_eq!(second.call(Request::WhoAmI).await, Reply::Identity(Some(identity)));
}

#[tokio::test]
async fn test_create_session_unknown_partner() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;
    client.sign_up("brock").await;

    let reply = client
        .call(Request::CreateSession {
            name: "Solo".into(),
            partner_handle: "nobody".into(),
        })
        .await;
    let (code, _) = expect_failed(reply);
    assert_eq!(code, ErrorCode::PartnerNotFound);
}

#[tokio::test]
async fn test_list_sessions_shows_partner_handle() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;

    match p.blue.call(Request::ListSessions).await {
        Reply::Sessions(sessions) => {
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].id, p.session.id);
            assert_eq!(sessions[0].partner_handle.as_deref(), Some("red"));
        }
        other => panic!("expected Sessions, got {other:?}"),
    }
}

// =========================================================================
// Live rosters
// =========================================================================

#[tokio::test]
async fn test_assignment_is_pushed_to_partner() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;
    let snapshot = expect_rosters(
        p.red
            .call(Request::GetRosters { session_id: p.session.id })
            .await,
    );
    let red_roster = snapshot.roster_for(p.red_id.id).unwrap().id;

    let reply = p
        .red
        .call(Request::AssignSpecies {
            roster_id: red_roster,
            slot: slot(0),
            entry: species("Pikachu"),
        })
        .await;
    assert_eq!(reply, Reply::Done);

    loop {
        let Push::Rosters(pushed) = p.blue.push().await else {
            panic!("expected a roster push");
        };
        assert_eq!(pushed.session_id, p.session.id);
        assert!(pushed.version > snapshot.version);
        if pushed.species_in_use().contains("Pikachu") {
            break;
        }
    }
}

#[tokio::test]
async fn test_partner_cannot_catch_same_species() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;
    let snapshot = expect_rosters(
        p.red
            .call(Request::GetRosters { session_id: p.session.id })
            .await,
    );
    let red_roster = snapshot.roster_for(p.red_id.id).unwrap().id;
    let blue_roster = snapshot.roster_for(p.blue_id.id).unwrap().id;

    p.red
        .call(Request::AssignSpecies {
            roster_id: red_roster,
            slot: slot(0),
            entry: species("Eevee"),
        })
        .await;
    let reply = p
        .blue
        .call(Request::AssignSpecies {
            roster_id: blue_roster,
            slot: slot(0),
            entry: species("Eevee"),
        })
        .await;

    let (code, message) = expect_failed(reply);
    assert_eq!(code, ErrorCode::DuplicateInSession);
    assert_eq!(message, "This Pokémon is already caught by your partner!");
}

#[tokio::test]
async fn test_editing_partner_roster_is_unauthorized() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;
    let snapshot = expect_rosters(
        p.blue
            .call(Request::GetRosters { session_id: p.session.id })
            .await,
    );
    let red_roster = snapshot.roster_for(p.red_id.id).unwrap().id;

    let reply = p
        .blue
        .call(Request::SetTrainerName {
            roster_id: red_roster,
            name: "Loser".into(),
        })
        .await;
    let (code, message) = expect_failed(reply);
    assert_eq!(code, ErrorCode::Unauthorized);
    assert_eq!(message, "You can only modify your own team!");
}

#[tokio::test]
async fn test_delete_session_notifies_watcher() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;

    assert_eq!(
        p.red
            .call(Request::DeleteSession { session_id: p.session.id })
            .await,
        Reply::Done
    );

    loop {
        match p.blue.push().await {
            Push::SessionClosed { session_id } => {
                assert_eq!(session_id, p.session.id);
                break;
            }
            Push::Rosters(_) => continue,
        }
    }
}

#[tokio::test]
async fn test_unwatch_stops_pushes() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;
    let snapshot = expect_rosters(
        p.red
            .call(Request::GetRosters { session_id: p.session.id })
            .await,
    );
    let red_roster = snapshot.roster_for(p.red_id.id).unwrap().id;

    assert_eq!(p.blue.call(Request::Unwatch).await, Reply::Done);
    p.red
        .call(Request::SetTrainerName {
            roster_id: red_roster,
            name: "Red".into(),
        })
        .await;

    // A heartbeat round trip proves the server has had time to push.
    send_system(&mut p.blue.ws, SystemMessage::Heartbeat { client_time: 7 }).await;
    match recv_envelope(&mut p.blue.ws).await.map(|e| e.payload) {
        Some(Payload::System(SystemMessage::HeartbeatAck { client_time, .. })) => {
            assert_eq!(client_time, 7);
        }
        other => panic!("expected only a HeartbeatAck, got {other:?}"),
    }
    assert!(p.blue.pushes.is_empty());
}

#[tokio::test]
async fn test_failed_sign_in_keeps_watch() {
    let addr = start_server().await;
    let mut p = pair(&addr).await;
    let snapshot = expect_rosters(
        p.blue
            .call(Request::GetRosters { session_id: p.session.id })
            .await,
    );
    let blue_roster = snapshot.roster_for(p.blue_id.id).unwrap().id;

    let reply = p
        .red
        .call(Request::SignIn {
            email: "red@kanto.org".into(),
            password: "wrong".into(),
        })
        .await;
    let (code, _) = expect_failed(reply);
    assert_eq!(code, ErrorCode::InvalidCredentials);
    assert_eq!(
        p.red.call(Request::WhoAmI).await,
        Reply::Identity(Some(p.red_id.clone()))
    );

    p.blue
        .call(Request::AssignSpecies {
            roster_id: blue_roster,
            slot: slot(3),
            entry: species("Totodile"),
        })
        .await;

    loop {
        let Push::Rosters(pushed) = p.red.push().await else {
            panic!("expected a roster push");
        };
        if pushed.species_in_use().contains("Totodile") {
            break;
        }
    }
}
