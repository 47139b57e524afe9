//! Persistent store interface (spec.md §6.2).
//!
//! The core depends on this trait only — schema, SQL, and indexes are the
//! collaborator's business. Two implementations live here: `memory` (an
//! in-process store used by tests and single-node dev) and `postgres` (the
//! production backend, grounded on the teacher's `repo/*.rs` layer).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub must_change_password: bool,
    pub lang: Option<String>,
    pub public: serde_json::Value,
    pub private: serde_json::Value,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationKind {
    Dm,
    Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub owner: Option<Uuid>,
    pub public_desc: Option<serde_json::Value>,
    pub pinned_seq: Option<i64>,
    pub disappearing_ttl: Option<i64>,
    pub no_screenshots: bool,
    pub last_seq: i64,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub conv_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub favorite: bool,
    pub muted: bool,
    /// Asymmetric: true iff this member has blocked the other DM party.
    /// DM-only per spec.md Open Questions.
    pub blocked: bool,
    pub private_blob: Option<serde_json::Value>,
    pub clear_seq: i64,
    pub read_seq: i64,
    pub recv_seq: i64,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberSettingsPatch {
    pub favorite: Option<bool>,
    pub muted: Option<bool>,
    pub blocked: Option<bool>,
    pub private_blob: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub conv_id: Uuid,
    pub seq: i64,
    pub sender: Uuid,
    /// Codec-sealed content; the core never inspects plaintext.
    pub content: String,
    pub reply_to: Option<i64>,
    pub view_once: bool,
    pub view_once_ttl: Option<i64>,
    pub edit_count: i32,
    /// Plaintext, client-asserted mention list (spec.md §4.6.11's `mentions`
    /// get variant). Never derived from `content`.
    pub mentions: Vec<Uuid>,
    pub reactions: HashMap<String, HashSet<Uuid>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_for: HashSet<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub owner: Uuid,
    pub user_id: Uuid,
    pub nickname: Option<String>,
}

/// The per-conversation settings patch applied by `room action=update`.
#[derive(Debug, Clone, Default)]
pub struct RoomDescriptorPatch {
    pub public_desc: Option<serde_json::Value>,
    pub disappearing_ttl: Option<Option<i64>>,
    pub no_screenshots: Option<bool>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // -- users / auth ------------------------------------------------------
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<User>;
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn search_users(&self, query: &str, limit: u32) -> StoreResult<Vec<User>>;
    async fn update_user_public(&self, id: Uuid, public: serde_json::Value) -> StoreResult<()>;
    async fn update_user_private(&self, id: Uuid, private: serde_json::Value) -> StoreResult<()>;
    async fn update_user_email(&self, id: Uuid, email: &str) -> StoreResult<()>;
    async fn update_user_lang(&self, id: Uuid, lang: &str) -> StoreResult<()>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;
    async fn clear_must_change_password(&self, id: Uuid) -> StoreResult<()>;
    async fn set_last_seen(&self, id: Uuid, ts: DateTime<Utc>) -> StoreResult<()>;
    async fn get_last_seen(&self, id: Uuid) -> StoreResult<Option<DateTime<Utc>>>;
    async fn verify_email_token(&self, token: &str) -> StoreResult<bool>;

    async fn create_auth_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Returns the owning user id iff the token hash is known and unexpired.
    async fn validate_token(&self, token_hash: &[u8]) -> StoreResult<Option<Uuid>>;

    // -- conversations / members --------------------------------------------
    /// Atomic at the Store level: returns the existing DM conversation
    /// without duplication if one already exists between the two users.
    async fn create_dm(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<(Uuid, bool)>;
    async fn create_room(
        &self,
        owner: Uuid,
        public_desc: serde_json::Value,
    ) -> StoreResult<Uuid>;
    async fn get_conversation(&self, conv: Uuid) -> StoreResult<Option<Conversation>>;
    async fn is_member(&self, conv: Uuid, user: Uuid) -> StoreResult<bool>;
    async fn get_member(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Member>>;
    async fn get_conversation_members(&self, conv: Uuid) -> StoreResult<Vec<Member>>;
    async fn get_user_conversations(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<(Conversation, Member)>>;
    async fn add_member(&self, conv: Uuid, user: Uuid, role: MemberRole) -> StoreResult<()>;
    async fn remove_member(&self, conv: Uuid, user: Uuid) -> StoreResult<()>;
    async fn update_member_settings(
        &self,
        conv: Uuid,
        user: Uuid,
        patch: MemberSettingsPatch,
    ) -> StoreResult<()>;
    async fn update_conversation_descriptor(
        &self,
        conv: Uuid,
        patch: RoomDescriptorPatch,
    ) -> StoreResult<()>;
    async fn update_dm_disappearing_ttl(&self, conv: Uuid, ttl: Option<i64>) -> StoreResult<()>;
    async fn close_conversation(&self, conv: Uuid) -> StoreResult<()>;
    async fn set_pinned_seq(&self, conv: Uuid, seq: Option<i64>) -> StoreResult<()>;
    async fn is_blocked(&self, conv: Uuid, sender: Uuid) -> StoreResult<bool>;
    async fn dm_other_user(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Uuid>>;

    async fn update_read_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64>;
    async fn update_recv_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64>;
    async fn update_clear_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64>;

    // -- messages ------------------------------------------------------------
    async fn create_message(
        &self,
        conv: Uuid,
        sender: Uuid,
        content: &str,
        reply_to: Option<i64>,
        view_once: bool,
        view_once_ttl: Option<i64>,
        mentions: &[Uuid],
    ) -> StoreResult<Message>;
    async fn get_message(&self, conv: Uuid, seq: i64) -> StoreResult<Option<Message>>;
    async fn edit_message(&self, conv: Uuid, seq: i64, content: &str) -> StoreResult<Message>;
    async fn unsend_message(&self, conv: Uuid, seq: i64) -> StoreResult<()>;
    async fn delete_for_me(&self, conv: Uuid, seq: i64, user: Uuid) -> StoreResult<()>;
    /// Atomic read-modify-write. Returns true if the reaction was added,
    /// false if it was removed (toggle law, spec.md §8).
    async fn toggle_reaction(
        &self,
        conv: Uuid,
        seq: i64,
        user: Uuid,
        emoji: &str,
    ) -> StoreResult<bool>;
    async fn get_messages(
        &self,
        conv: Uuid,
        before_seq: Option<i64>,
        limit: u32,
        requesting_user: Uuid,
    ) -> StoreResult<Vec<Message>>;
    /// Messages across any of `user`'s conversations that mention them,
    /// newest first.
    async fn get_mentions(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>>;

    // -- invites / contacts ---------------------------------------------------
    async fn create_invite(
        &self,
        created_by: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> StoreResult<Invite>;
    async fn list_invites(&self, created_by: Uuid) -> StoreResult<Vec<Invite>>;
    async fn revoke_invite(&self, id: Uuid, created_by: Uuid) -> StoreResult<()>;
    async fn redeem_invite(&self, code: &str, redeemed_by: Uuid) -> StoreResult<Option<Invite>>;

    async fn add_contact(&self, owner: Uuid, user: Uuid, nickname: Option<&str>)
        -> StoreResult<()>;
    async fn remove_contact(&self, owner: Uuid, user: Uuid) -> StoreResult<()>;
    async fn list_contacts(&self, owner: Uuid) -> StoreResult<Vec<Contact>>;

    /// Out-of-scope file upload/media collaborator (spec.md §1); only a
    /// membership-gated existence check is needed by the core.
    async fn check_file_access(&self, conv: Uuid, user: Uuid) -> StoreResult<bool> {
        self.is_member(conv, user).await
    }
}
