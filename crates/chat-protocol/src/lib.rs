//! Wire envelope types for the chat-hub client/server frame protocol.
//!
//! Every frame (either direction) is one JSON object. Client frames carry at
//! most one opcode key plus an optional `id` correlator; server frames carry
//! at most one of `ctrl`/`data`/`info`/`pres`. The envelope itself never
//! rejects multiple opcodes at the (de)serialization layer — that validation
//! is a dispatcher concern (see `services/server/src/dispatcher.rs`) so that
//! a malformed frame can still be parsed far enough to extract `id` for the
//! error reply.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi: Option<HiPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<AccPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm: Option<DmPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<SendPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<GetPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsend: Option<SeqRefPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<DeletePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react: Option<ReactPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing: Option<ConvRefPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<SeqRefPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv: Option<SeqRefPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<SeqRefPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite: Option<InvitePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<SeqRefPayload>,
}

impl ClientFrame {
    /// Names of opcode slots that are populated. Used by the dispatcher to
    /// enforce the single-opcode invariant (spec.md Testable Property 8).
    pub fn present_opcodes(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        macro_rules! check {
            ($field:ident) => {
                if self.$field.is_some() {
                    out.push(stringify!($field));
                }
            };
        }
        check!(hi);
        check!(login);
        check!(acc);
        check!(search);
        check!(dm);
        check!(room);
        check!(send);
        check!(get);
        check!(edit);
        check!(unsend);
        check!(delete);
        check!(react);
        check!(typing);
        check!(read);
        check!(recv);
        check!(clear);
        check!(invite);
        check!(contact);
        check!(pin);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiPayload {
    pub ver: String,
    #[serde(default)]
    pub ua: Option<String>,
    #[serde(default)]
    pub dev: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginScheme {
    Basic,
    Token,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginPayload {
    pub scheme: LoginScheme,
    /// Base64-encoded secret: `user:pass` for basic, a signed token for token.
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccDesc {
    #[serde(default)]
    pub public: Option<serde_json::Value>,
    #[serde(default)]
    pub private: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccPayload {
    /// "new" | "me"
    pub user: String,
    #[serde(default)]
    pub scheme: Option<LoginScheme>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub desc: Option<AccDesc>,
    #[serde(default, rename = "inviteCode")]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    /// Present only for a password change on an existing account.
    #[serde(default, rename = "currentSecret")]
    pub current_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPayload {
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmPayload {
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub conv: Option<Uuid>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub blocked: Option<bool>,
    #[serde(default)]
    pub private: Option<serde_json::Value>,
    #[serde(default, rename = "disappearingTTL")]
    pub disappearing_ttl: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPayload {
    /// "new" or an existing room UUID.
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub desc: Option<serde_json::Value>,
    #[serde(default, rename = "disappearingTTL")]
    pub disappearing_ttl: Option<i64>,
    #[serde(default, rename = "noScreenshots")]
    pub no_screenshots: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPayload {
    pub conv: Uuid,
    pub content: String,
    #[serde(default, rename = "replyTo")]
    pub reply_to: Option<i64>,
    #[serde(default, rename = "viewOnce")]
    pub view_once: Option<bool>,
    #[serde(default, rename = "viewOnceTTL")]
    pub view_once_ttl: Option<i64>,
    /// Plaintext, client-asserted mention list. Never derived from
    /// `content`, which the core cannot read.
    #[serde(default)]
    pub mentions: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPayload {
    pub what: String,
    #[serde(default)]
    pub conv: Option<Uuid>,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub before: Option<i64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPayload {
    pub conv: Uuid,
    pub seq: i64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeqRefPayload {
    pub conv: Uuid,
    pub seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvRefPayload {
    pub conv: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePayload {
    pub conv: Uuid,
    pub seq: i64,
    #[serde(default, rename = "forEveryone")]
    pub for_everyone: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactPayload {
    pub conv: Uuid,
    pub seq: i64,
    pub emoji: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteCreate {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitePayload {
    #[serde(default)]
    pub create: Option<InviteCreate>,
    #[serde(default)]
    pub list: Option<bool>,
    #[serde(default)]
    pub revoke: Option<Uuid>,
    #[serde(default)]
    pub redeem: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    pub add: Option<bool>,
    #[serde(default)]
    pub remove: Option<bool>,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub nickname: Option<String>,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl: Option<Ctrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pres: Option<Pres>,
}

impl ServerFrame {
    pub fn ctrl(c: Ctrl) -> Self {
        Self {
            ctrl: Some(c),
            ..Default::default()
        }
    }
    pub fn data(d: Data) -> Self {
        Self {
            data: Some(d),
            ..Default::default()
        }
    }
    pub fn info(i: Info) -> Self {
        Self {
            info: Some(i),
            ..Default::default()
        }
    }
    pub fn pres(p: Pres) -> Self {
        Self {
            pres: Some(p),
            ..Default::default()
        }
    }
}

/// HTTP-convention control codes (spec.md §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrlCode {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    TooManyRequests = 429,
    InternalError = 500,
}

impl CtrlCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ctrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Ctrl {
    pub fn new(id: Option<String>, code: CtrlCode) -> Self {
        Self {
            id,
            code: code.as_u16(),
            text: None,
            params: None,
            ts: chrono::Utc::now(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    pub conv: Uuid,
    pub seq: i64,
    pub from: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<serde_json::Value>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoWhat {
    Edit,
    Unsend,
    Delete,
    React,
    Typing,
    Read,
    Recv,
    Pin,
    Unpin,
    DisappearingUpdated,
    MemberJoined,
    MemberLeft,
    MemberKicked,
    RoomUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub conv: Uuid,
    pub from: Uuid,
    pub what: InfoWhat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresWhat {
    On,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pres {
    pub user: Uuid,
    pub what: PresWhat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_opcode_frame_round_trips() {
        let frame = ClientFrame {
            id: Some("1".to_owned()),
            send: Some(SendPayload {
                conv: Uuid::nil(),
                content: "hi".to_owned(),
                reply_to: None,
                view_once: None,
                view_once_ttl: None,
                mentions: None,
            }),
            ..Default::default()
        };
        assert_eq!(frame.present_opcodes(), vec!["send"]);
        let json = serde_json::to_string(&frame).unwrap();
        let back: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.present_opcodes(), vec!["send"]);
    }

    #[test]
    fn multi_opcode_frame_is_detected() {
        let frame = ClientFrame {
            id: Some("1".to_owned()),
            typing: Some(ConvRefPayload { conv: Uuid::nil() }),
            read: Some(SeqRefPayload {
                conv: Uuid::nil(),
                seq: 1,
            }),
            ..Default::default()
        };
        assert_eq!(frame.present_opcodes().len(), 2);
    }

    #[test]
    fn ctrl_frame_serializes_with_code_as_number() {
        let frame = ServerFrame::ctrl(
            Ctrl::new(Some("1".to_owned()), CtrlCode::Accepted).with_params(serde_json::json!({"seq": 1})),
        );
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["ctrl"]["code"], 202);
        assert_eq!(json["ctrl"]["params"]["seq"], 1);
    }

    #[test]
    fn no_opcodes_present_on_empty_frame() {
        let frame = ClientFrame::default();
        assert!(frame.present_opcodes().is_empty());
    }
}
