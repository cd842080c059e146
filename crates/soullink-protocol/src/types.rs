//! Message types that travel on the wire.
//!
//! Every frame is an [`Envelope`]. Its [`Payload`] is either framework
//! plumbing ([`SystemMessage`]), a client call ([`Request`]) with its
//! [`Reply`], or a server-initiated [`Push`] produced by the change
//! notifier.
//!
//! ```text
//! client                              server
//!   │ ── System::Handshake ──────────→ │
//!   │ ←───────── System::HandshakeAck ─ │
//!   │ ── Call{ call_id: 1, SignIn } ─→ │
//!   │ ←── Reply{ call_id: 1, SignedIn } │
//!   │ ── Call{ call_id: 2, Watch } ──→ │
//!   │ ←───────── Push::Rosters(v=14) ── │
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    EntryDraft, EntryId, Identity, RosterId, RosterSnapshot, SessionId,
    SessionSummary, SlotIndex, Species,
};

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Connection plumbing: handshake, keep-alive, disconnect, fatal errors.
///
/// Internally tagged, so `Heartbeat { client_time: 5 }` is
/// `{ "type": "Heartbeat", "client_time": 5 }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection.
    Handshake { version: u32 },

    /// Server → Client: the connection is ready for calls.
    HandshakeAck { server_time: u64 },

    /// Client → Server: keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client: echoes `client_time` so the client can measure RTT.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Either direction: the sender is closing the connection.
    Disconnect { reason: String },

    /// Server → Client: a connection-level failure, with an HTTP-style code.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Request / Reply
// ---------------------------------------------------------------------------

/// Operations a client can call. Tagged by `"op"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        handle: String,
        email: String,
        password: String,
    },
    SignOut,
    /// Restore a signed-in identity from an access token.
    Resume {
        token: String,
    },
    WhoAmI,
    CreateSession {
        name: String,
        partner_handle: String,
    },
    ListSessions,
    DeleteSession {
        session_id: SessionId,
    },
    GetRosters {
        session_id: SessionId,
    },
    SetTrainerName {
        roster_id: RosterId,
        name: String,
    },
    AssignSpecies {
        roster_id: RosterId,
        slot: SlotIndex,
        entry: EntryDraft,
    },
    ClearSlot {
        roster_id: RosterId,
        slot: SlotIndex,
    },
    RenameEntry {
        entry_id: EntryId,
        nickname: String,
    },
    /// Start receiving [`Push::Rosters`] for a session.
    Watch {
        session_id: SessionId,
    },
    Unwatch,
    Catalog,
}

impl Request {
    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::SignUp { .. } => "sign_up",
            Self::SignOut => "sign_out",
            Self::Resume { .. } => "resume",
            Self::WhoAmI => "who_am_i",
            Self::CreateSession { .. } => "create_session",
            Self::ListSessions => "list_sessions",
            Self::DeleteSession { .. } => "delete_session",
            Self::GetRosters { .. } => "get_rosters",
            Self::SetTrainerName { .. } => "set_trainer_name",
            Self::AssignSpecies { .. } => "assign_species",
            Self::ClearSlot { .. } => "clear_slot",
            Self::RenameEntry { .. } => "rename_entry",
            Self::Watch { .. } => "watch",
            Self::Unwatch => "unwatch",
            Self::Catalog => "catalog",
        }
    }
}

/// Machine-readable failure category returned with [`Reply::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthenticated,
    InvalidCredentials,
    PartnerNotFound,
    HandleTaken,
    DuplicateInSession,
    NotFound,
    Unauthorized,
    Conflict,
    InvalidInput,
    /// A transient storage or identity-provider failure.
    Unavailable,
}

impl ErrorCode {
    /// The closest HTTP status, used for [`SystemMessage::Error`] codes.
    pub fn status(self) -> u16 {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => 401,
            Self::Unauthorized => 403,
            Self::PartnerNotFound | Self::NotFound => 404,
            Self::HandleTaken | Self::DuplicateInSession | Self::Conflict => 409,
            Self::InvalidInput => 400,
            Self::Unavailable => 503,
        }
    }
}

/// The answer to one [`Request`].
///
/// Adjacently tagged: `{ "kind": "sessions", "data": [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Reply {
    /// The call succeeded and has nothing to return.
    Done,
    SignedIn {
        identity: Identity,
        token: String,
    },
    Identity(Option<Identity>),
    Session(SessionSummary),
    Sessions(Vec<SessionSummary>),
    Rosters(RosterSnapshot),
    Catalog(Vec<Species>),
    /// The call failed; `message` is ready to show to the user.
    Failed {
        code: ErrorCode,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Server-initiated messages for a watched session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Push {
    /// A fresh read of both rosters after a change.
    Rosters(RosterSnapshot),
    /// The watched session was deleted; no further pushes follow.
    SessionClosed { session_id: SessionId },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    /// Client → Server. `call_id` is echoed in the matching reply.
    Call { call_id: u64, request: Request },
    /// Server → Client.
    Reply { call_id: u64, reply: Reply },
    Push(Push),
}

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: Payload,
}

impl Envelope {
    /// Wraps a payload.
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_is_internally_tagged() {
        let msg = SystemMessage::Handshake { version: 1 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn test_request_is_tagged_by_op() {
        let req = Request::CreateSession {
            name: "Run A".into(),
            partner_handle: "misty".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "create_session");
        assert_eq!(json["partner_handle"], "misty");
    }

    #[test]
    fn test_unit_request_decodes_from_op_only() {
        let req: Request = serde_json::from_str(r#"{"op":"list_sessions"}"#).unwrap();
        assert_eq!(req, Request::ListSessions);
    }

    #[test]
    fn test_clear_slot_with_bad_slot_fails_to_decode() {
        let json = format!(
            r#"{{"op":"clear_slot","roster_id":"{}","slot":7}}"#,
            RosterId::new()
        );
        let req: Result<Request, _> = serde_json::from_str(&json);
        assert!(req.is_err());
    }

    #[test]
    fn test_failed_reply_json_shape() {
        let reply = Reply::Failed {
            code: ErrorCode::DuplicateInSession,
            message: "taken".into(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["data"]["code"], "duplicate_in_session");
    }

    #[test]
    fn test_done_reply_has_no_data() {
        let json = serde_json::to_value(Reply::Done).unwrap();
        assert_eq!(json["kind"], "done");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_call_payload_json_shape() {
        let env = Envelope::new(
            3,
            120,
            Payload::Call {
                call_id: 9,
                request: Request::WhoAmI,
            },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["payload"]["type"], "Call");
        assert_eq!(json["payload"]["data"]["call_id"], 9);
        assert_eq!(json["payload"]["data"]["request"]["op"], "who_am_i");
    }

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthenticated.status(), 401);
        assert_eq!(ErrorCode::Unauthorized.status(), 403);
        assert_eq!(ErrorCode::DuplicateInSession.status(), 409);
        assert_eq!(ErrorCode::Unavailable.status(), 503);
    }

    #[test]
    fn test_request_name_matches_wire_op() {
        let req = Request::RenameEntry {
            entry_id: EntryId::new(),
            nickname: "Sparky".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], req.name());
    }
}
