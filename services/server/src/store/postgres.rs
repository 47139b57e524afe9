//! Postgres-backed `Store`. Runtime-checked queries (`sqlx::query` +
//! `.bind()`/`Row::get()`) throughout rather than the `query!` macro family,
//! so the workspace builds without a live `DATABASE_URL`, matching the style
//! the teacher already uses in its own `repo/races.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{
    Contact, Conversation, ConversationKind, Invite, Member, MemberRole, MemberSettingsPatch,
    Message, RoomDescriptorPatch, Store, StoreError, StoreResult, User,
};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn str_to_kind(s: &str) -> ConversationKind {
    match s {
        "room" => ConversationKind::Room,
        _ => ConversationKind::Dm,
    }
}

fn role_to_str(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Owner => "owner",
        MemberRole::Admin => "admin",
        MemberRole::Member => "member",
    }
}

fn str_to_role(s: &str) -> MemberRole {
    match s {
        "owner" => MemberRole::Owner,
        "admin" => MemberRole::Admin,
        _ => MemberRole::Member,
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        must_change_password: row.get("must_change_password"),
        lang: row.get("lang"),
        public: row.get("public"),
        private: row.get("private"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}

fn row_to_conversation(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        kind: str_to_kind(row.get("kind")),
        owner: row.get("owner"),
        public_desc: row.get("public_desc"),
        pinned_seq: row.get("pinned_seq"),
        disappearing_ttl: row.get("disappearing_ttl"),
        no_screenshots: row.get("no_screenshots"),
        last_seq: row.get("last_seq"),
        closed: row.get("closed"),
        created_at: row.get("created_at"),
    }
}

fn row_to_member(row: &sqlx::postgres::PgRow) -> Member {
    Member {
        conv_id: row.get("conv_id"),
        user_id: row.get("user_id"),
        role: str_to_role(row.get("role")),
        favorite: row.get("favorite"),
        muted: row.get("muted"),
        blocked: row.get("blocked"),
        private_blob: row.get("private_blob"),
        clear_seq: row.get("clear_seq"),
        read_seq: row.get("read_seq"),
        recv_seq: row.get("recv_seq"),
        joined_at: row.get("joined_at"),
        left_at: row.get("left_at"),
    }
}

fn row_to_message(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        conv_id: row.get("conv_id"),
        seq: row.get("seq"),
        sender: row.get("sender"),
        content: row.get("content"),
        reply_to: row.get("reply_to"),
        view_once: row.get("view_once"),
        view_once_ttl: row.get("view_once_ttl"),
        edit_count: row.get("edit_count"),
        mentions: Vec::new(),
        reactions: HashMap::new(),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
        deleted_for: HashSet::new(),
    }
}

fn row_to_invite(row: &sqlx::postgres::PgRow) -> Invite {
    Invite {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        code: row.get("code"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        revoked_at: row.get("revoked_at"),
        redeemed_by: row.get("redeemed_by"),
    }
}

impl PostgresStore {
    async fn load_reactions(&self, conv: Uuid, seq: i64) -> StoreResult<HashMap<String, HashSet<Uuid>>> {
        let rows = sqlx::query("SELECT emoji, user_id FROM message_reactions WHERE conv_id = $1 AND seq = $2")
            .bind(conv)
            .bind(seq)
            .fetch_all(&self.pool)
            .await?;
        let mut out: HashMap<String, HashSet<Uuid>> = HashMap::new();
        for row in rows {
            let emoji: String = row.get("emoji");
            let user_id: Uuid = row.get("user_id");
            out.entry(emoji).or_default().insert(user_id);
        }
        Ok(out)
    }

    async fn load_deleted_for(&self, conv: Uuid, seq: i64) -> StoreResult<HashSet<Uuid>> {
        let rows = sqlx::query("SELECT user_id FROM message_deleted_for WHERE conv_id = $1 AND seq = $2")
            .bind(conv)
            .bind(seq)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
    }

    async fn load_mentions(&self, conv: Uuid, seq: i64) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT user_id FROM message_mentions WHERE conv_id = $1 AND seq = $2")
            .bind(conv)
            .bind(seq)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
    }

    async fn hydrate_message(&self, mut m: Message) -> StoreResult<Message> {
        m.reactions = self.load_reactions(m.conv_id, m.seq).await?;
        m.deleted_for = self.load_deleted_for(m.conv_id, m.seq).await?;
        m.mentions = self.load_mentions(m.conv_id, m.seq).await?;
        Ok(m)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<User> {
        let row = sqlx::query(
            r#"INSERT INTO users (id, username, password_hash, email, lang)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, username, password_hash, email, email_verified,
                         must_change_password, lang, public, private, last_seen, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(lang)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict("username taken".into())
            }
            _ => StoreError::from(e),
        })?;
        Ok(row_to_user(&row))
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS exists")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("exists"))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn search_users(&self, query: &str, limit: u32) -> StoreResult<Vec<User>> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query("SELECT * FROM users WHERE username ILIKE $1 LIMIT $2")
            .bind(pattern)
            .bind(i64::from(limit.max(1)))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn update_user_public(&self, id: Uuid, public: serde_json::Value) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET public = $1 WHERE id = $2")
            .bind(public)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_user_private(&self, id: Uuid, private: serde_json::Value) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET private = $1 WHERE id = $2")
            .bind(private)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_user_email(&self, id: Uuid, email: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET email = $1, email_verified = FALSE WHERE id = $2")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_user_lang(&self, id: Uuid, lang: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET lang = $1 WHERE id = $2")
            .bind(lang)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_must_change_password(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE users SET must_change_password = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_last_seen(&self, id: Uuid, ts: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_seen = $1 WHERE id = $2")
            .bind(ts)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_last_seen(&self, id: Uuid) -> StoreResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT last_seen FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get("last_seen")))
    }

    async fn verify_email_token(&self, token: &str) -> StoreResult<bool> {
        if token.is_empty() {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE WHERE id::text LIKE $1 AND email_verified = FALSE",
        )
        .bind(format!("{token}%"))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_auth_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn validate_token(&self, token_hash: &[u8]) -> StoreResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT user_id FROM auth_tokens WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("user_id")))
    }

    async fn create_dm(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<(Uuid, bool)> {
        let (lo, hi) = if user_a < user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query("SELECT conv_id FROM dm_index WHERE user_lo = $1 AND user_hi = $2 FOR UPDATE")
            .bind(lo)
            .bind(hi)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            return Ok((row.get("conv_id"), false));
        }
        let conv_id = Uuid::new_v4();
        sqlx::query("INSERT INTO conversations (id, kind) VALUES ($1, 'dm')")
            .bind(conv_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO dm_index (user_lo, user_hi, conv_id) VALUES ($1, $2, $3)")
            .bind(lo)
            .bind(hi)
            .bind(conv_id)
            .execute(&mut *tx)
            .await?;
        for u in [user_a, user_b] {
            sqlx::query("INSERT INTO members (conv_id, user_id, role) VALUES ($1, $2, 'member')")
                .bind(conv_id)
                .bind(u)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok((conv_id, true))
    }

    async fn create_room(&self, owner: Uuid, public_desc: serde_json::Value) -> StoreResult<Uuid> {
        let mut tx = self.pool.begin().await?;
        let conv_id = Uuid::new_v4();
        sqlx::query("INSERT INTO conversations (id, kind, owner, public_desc) VALUES ($1, 'room', $2, $3)")
            .bind(conv_id)
            .bind(owner)
            .bind(public_desc)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO members (conv_id, user_id, role) VALUES ($1, $2, 'owner')")
            .bind(conv_id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(conv_id)
    }

    async fn get_conversation(&self, conv: Uuid) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = $1")
            .bind(conv)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_conversation))
    }

    async fn is_member(&self, conv: Uuid, user: Uuid) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM members WHERE conv_id = $1 AND user_id = $2 AND left_at IS NULL) AS exists",
        )
        .bind(conv)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("exists"))
    }

    async fn get_member(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Member>> {
        let row = sqlx::query("SELECT * FROM members WHERE conv_id = $1 AND user_id = $2")
            .bind(conv)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_member))
    }

    async fn get_conversation_members(&self, conv: Uuid) -> StoreResult<Vec<Member>> {
        let rows = sqlx::query("SELECT * FROM members WHERE conv_id = $1 AND left_at IS NULL")
            .bind(conv)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn get_user_conversations(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<(Conversation, Member)>> {
        let rows = sqlx::query(
            r#"SELECT c.*, m.role, m.favorite, m.muted, m.blocked, m.private_blob,
                      m.clear_seq, m.read_seq, m.recv_seq, m.joined_at, m.left_at,
                      m.conv_id AS m_conv_id, m.user_id AS m_user_id
               FROM conversations c
               JOIN members m ON m.conv_id = c.id
               WHERE m.user_id = $1 AND m.left_at IS NULL
                 AND ($2::timestamptz IS NULL OR c.created_at < $2)
               ORDER BY c.created_at DESC
               LIMIT $3"#,
        )
        .bind(user)
        .bind(before)
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let conv = row_to_conversation(row);
                let member = Member {
                    conv_id: row.get("m_conv_id"),
                    user_id: row.get("m_user_id"),
                    role: str_to_role(row.get("role")),
                    favorite: row.get("favorite"),
                    muted: row.get("muted"),
                    blocked: row.get("blocked"),
                    private_blob: row.get("private_blob"),
                    clear_seq: row.get("clear_seq"),
                    read_seq: row.get("read_seq"),
                    recv_seq: row.get("recv_seq"),
                    joined_at: row.get("joined_at"),
                    left_at: row.get("left_at"),
                };
                (conv, member)
            })
            .collect())
    }

    async fn add_member(&self, conv: Uuid, user: Uuid, role: MemberRole) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO members (conv_id, user_id, role) VALUES ($1, $2, $3)
               ON CONFLICT (conv_id, user_id) DO UPDATE SET left_at = NULL, role = EXCLUDED.role"#,
        )
        .bind(conv)
        .bind(user)
        .bind(role_to_str(role))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_member(&self, conv: Uuid, user: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE members SET left_at = now() WHERE conv_id = $1 AND user_id = $2")
            .bind(conv)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_member_settings(
        &self,
        conv: Uuid,
        user: Uuid,
        patch: MemberSettingsPatch,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE members SET
                 favorite = COALESCE($3, favorite),
                 muted = COALESCE($4, muted),
                 blocked = COALESCE($5, blocked),
                 private_blob = COALESCE($6, private_blob)
               WHERE conv_id = $1 AND user_id = $2"#,
        )
        .bind(conv)
        .bind(user)
        .bind(patch.favorite)
        .bind(patch.muted)
        .bind(patch.blocked)
        .bind(patch.private_blob)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_conversation_descriptor(
        &self,
        conv: Uuid,
        patch: RoomDescriptorPatch,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE conversations SET
                 public_desc = COALESCE($2, public_desc),
                 disappearing_ttl = CASE WHEN $3 THEN $4 ELSE disappearing_ttl END,
                 no_screenshots = COALESCE($5, no_screenshots)
               WHERE id = $1"#,
        )
        .bind(conv)
        .bind(patch.public_desc)
        .bind(patch.disappearing_ttl.is_some())
        .bind(patch.disappearing_ttl.flatten())
        .bind(patch.no_screenshots)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_dm_disappearing_ttl(&self, conv: Uuid, ttl: Option<i64>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE conversations SET disappearing_ttl = $2 WHERE id = $1")
            .bind(conv)
            .bind(ttl)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn close_conversation(&self, conv: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE conversations SET closed = TRUE WHERE id = $1")
            .bind(conv)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_pinned_seq(&self, conv: Uuid, seq: Option<i64>) -> StoreResult<()> {
        sqlx::query("UPDATE conversations SET pinned_seq = $2 WHERE id = $1")
            .bind(conv)
            .bind(seq)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_blocked(&self, conv: Uuid, sender: Uuid) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS(
                 SELECT 1 FROM members
                 WHERE conv_id = $1 AND user_id != $2 AND blocked = TRUE
               ) AS exists"#,
        )
        .bind(conv)
        .bind(sender)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("exists"))
    }

    async fn dm_other_user(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Uuid>> {
        let row = sqlx::query("SELECT user_id FROM members WHERE conv_id = $1 AND user_id != $2 LIMIT 1")
            .bind(conv)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("user_id")))
    }

    async fn update_read_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"UPDATE members SET read_seq = GREATEST(read_seq, $3)
               WHERE conv_id = $1 AND user_id = $2 RETURNING read_seq"#,
        )
        .bind(conv)
        .bind(user)
        .bind(seq)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(row.get("read_seq"))
    }

    async fn update_recv_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"UPDATE members SET recv_seq = GREATEST(recv_seq, $3)
               WHERE conv_id = $1 AND user_id = $2 RETURNING recv_seq"#,
        )
        .bind(conv)
        .bind(user)
        .bind(seq)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(row.get("recv_seq"))
    }

    async fn update_clear_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"UPDATE members SET clear_seq = GREATEST(clear_seq, $3)
               WHERE conv_id = $1 AND user_id = $2 RETURNING clear_seq"#,
        )
        .bind(conv)
        .bind(user)
        .bind(seq)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(row.get("clear_seq"))
    }

    async fn create_message(
        &self,
        conv: Uuid,
        sender: Uuid,
        content: &str,
        reply_to: Option<i64>,
        view_once: bool,
        view_once_ttl: Option<i64>,
        mentions: &[Uuid],
    ) -> StoreResult<Message> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "UPDATE conversations SET last_seq = last_seq + 1 WHERE id = $1 RETURNING last_seq",
        )
        .bind(conv)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        let seq: i64 = row.get("last_seq");
        sqlx::query(
            r#"INSERT INTO messages (conv_id, seq, sender, content, reply_to, view_once, view_once_ttl)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(conv)
        .bind(seq)
        .bind(sender)
        .bind(content)
        .bind(reply_to)
        .bind(view_once)
        .bind(view_once_ttl)
        .execute(&mut *tx)
        .await?;
        for mentioned in mentions {
            sqlx::query(
                "INSERT INTO message_mentions (conv_id, seq, user_id) VALUES ($1, $2, $3)",
            )
            .bind(conv)
            .bind(seq)
            .bind(mentioned)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.get_message(conv, seq)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_message(&self, conv: Uuid, seq: i64) -> StoreResult<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE conv_id = $1 AND seq = $2")
            .bind(conv)
            .bind(seq)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_message(row_to_message(&row)).await?)),
            None => Ok(None),
        }
    }

    async fn edit_message(&self, conv: Uuid, seq: i64, content: &str) -> StoreResult<Message> {
        let row = sqlx::query(
            r#"UPDATE messages SET content = $3, edit_count = edit_count + 1
               WHERE conv_id = $1 AND seq = $2 RETURNING *"#,
        )
        .bind(conv)
        .bind(seq)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        self.hydrate_message(row_to_message(&row)).await
    }

    async fn unsend_message(&self, conv: Uuid, seq: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET deleted_at = now() WHERE conv_id = $1 AND seq = $2",
        )
        .bind(conv)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_for_me(&self, conv: Uuid, seq: i64, user: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO message_deleted_for (conv_id, seq, user_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(conv)
        .bind(seq)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn toggle_reaction(
        &self,
        conv: Uuid,
        seq: i64,
        user: Uuid,
        emoji: &str,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query(
            "DELETE FROM message_reactions WHERE conv_id = $1 AND seq = $2 AND user_id = $3 AND emoji = $4",
        )
        .bind(conv)
        .bind(seq)
        .bind(user)
        .bind(emoji)
        .execute(&mut *tx)
        .await?;
        let added = deleted.rows_affected() == 0;
        if added {
            sqlx::query(
                "INSERT INTO message_reactions (conv_id, seq, emoji, user_id) VALUES ($1, $2, $3, $4)",
            )
            .bind(conv)
            .bind(seq)
            .bind(emoji)
            .bind(user)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(added)
    }

    async fn get_messages(
        &self,
        conv: Uuid,
        before_seq: Option<i64>,
        limit: u32,
        requesting_user: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"SELECT m.* FROM messages m
               JOIN members mem ON mem.conv_id = m.conv_id AND mem.user_id = $4
               WHERE m.conv_id = $1
                 AND m.seq > mem.clear_seq
                 AND ($2::bigint IS NULL OR m.seq < $2)
                 AND NOT EXISTS (
                   SELECT 1 FROM message_deleted_for d
                   WHERE d.conv_id = m.conv_id AND d.seq = m.seq AND d.user_id = $4
                 )
               ORDER BY m.seq DESC
               LIMIT $3"#,
        )
        .bind(conv)
        .bind(before_seq)
        .bind(i64::from(limit.max(1)))
        .bind(requesting_user)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.hydrate_message(row_to_message(row)).await?);
        }
        Ok(out)
    }

    async fn get_mentions(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"SELECT m.* FROM messages m
               JOIN message_mentions mm ON mm.conv_id = m.conv_id AND mm.seq = m.seq
               WHERE mm.user_id = $1
                 AND ($2::timestamptz IS NULL OR m.created_at < $2)
                 AND NOT EXISTS (
                   SELECT 1 FROM message_deleted_for d
                   WHERE d.conv_id = m.conv_id AND d.seq = m.seq AND d.user_id = $1
                 )
               ORDER BY m.created_at DESC
               LIMIT $3"#,
        )
        .bind(user)
        .bind(before)
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.hydrate_message(row_to_message(row)).await?);
        }
        Ok(out)
    }

    async fn create_invite(
        &self,
        created_by: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> StoreResult<Invite> {
        let code = Uuid::new_v4().simple().to_string();
        let row = sqlx::query(
            r#"INSERT INTO invites (id, email, name, code, created_by)
               VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(code)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_invite(&row))
    }

    async fn list_invites(&self, created_by: Uuid) -> StoreResult<Vec<Invite>> {
        let rows = sqlx::query("SELECT * FROM invites WHERE created_by = $1")
            .bind(created_by)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_invite).collect())
    }

    async fn revoke_invite(&self, id: Uuid, created_by: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE invites SET revoked_at = now() WHERE id = $1 AND created_by = $2",
        )
        .bind(id)
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn redeem_invite(&self, code: &str, redeemed_by: Uuid) -> StoreResult<Option<Invite>> {
        let row = sqlx::query(
            r#"UPDATE invites SET redeemed_by = $2
               WHERE code = $1 AND revoked_at IS NULL AND redeemed_by IS NULL
               RETURNING *"#,
        )
        .bind(code)
        .bind(redeemed_by)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_invite))
    }

    async fn add_contact(&self, owner: Uuid, user: Uuid, nickname: Option<&str>) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO contacts (owner, user_id, nickname) VALUES ($1, $2, $3)
               ON CONFLICT (owner, user_id) DO UPDATE SET nickname = EXCLUDED.nickname"#,
        )
        .bind(owner)
        .bind(user)
        .bind(nickname)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_contact(&self, owner: Uuid, user: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM contacts WHERE owner = $1 AND user_id = $2")
            .bind(owner)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_contacts(&self, owner: Uuid) -> StoreResult<Vec<Contact>> {
        let rows = sqlx::query("SELECT owner, user_id, nickname FROM contacts WHERE owner = $1")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| Contact {
                owner: r.get("owner"),
                user_id: r.get("user_id"),
                nickname: r.get("nickname"),
            })
            .collect())
    }
}
