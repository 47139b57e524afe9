//! In-process `Store` implementation: the default for dev/single-node and
//! the backend used by every test in this workspace. Mirrors the semantics
//! the Postgres implementation must provide, most importantly atomic seq
//! assignment and atomic reaction toggling (spec.md §9).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    Contact, Conversation, ConversationKind, Invite, Member, MemberRole, MemberSettingsPatch,
    Message, RoomDescriptorPatch, Store, StoreError, StoreResult, User,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    tokens: HashMap<Vec<u8>, (Uuid, DateTime<Utc>)>,
    conversations: HashMap<Uuid, Conversation>,
    dm_index: HashMap<(Uuid, Uuid), Uuid>,
    members: HashMap<(Uuid, Uuid), Member>,
    conv_members: HashMap<Uuid, Vec<Uuid>>,
    user_convs: HashMap<Uuid, Vec<Uuid>>,
    messages: HashMap<Uuid, HashMap<i64, Message>>,
    invites: HashMap<Uuid, Invite>,
    invites_by_code: HashMap<String, Uuid>,
    contacts: HashMap<Uuid, Vec<Contact>>,
}

fn dm_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct InMemoryStore {
    state: Mutex<State>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<User> {
        let mut s = self.state.lock().unwrap();
        if s.usernames.contains_key(username) {
            return Err(StoreError::Conflict("username taken".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            email: email.map(ToOwned::to_owned),
            email_verified: false,
            must_change_password: false,
            lang: lang.map(ToOwned::to_owned),
            public: serde_json::json!({}),
            private: serde_json::json!({}),
            last_seen: None,
            created_at: Utc::now(),
        };
        s.usernames.insert(username.to_owned(), user.id);
        s.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.state.lock().unwrap().usernames.contains_key(username))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let s = self.state.lock().unwrap();
        Ok(s.usernames.get(username).and_then(|id| s.users.get(id)).cloned())
    }

    async fn search_users(&self, query: &str, limit: u32) -> StoreResult<Vec<User>> {
        let s = self.state.lock().unwrap();
        let q = query.to_lowercase();
        Ok(s.users
            .values()
            .filter(|u| u.username.to_lowercase().contains(&q))
            .take(limit.max(1) as usize)
            .cloned()
            .collect())
    }

    async fn update_user_public(&self, id: Uuid, public: serde_json::Value) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.public = public;
        Ok(())
    }

    async fn update_user_private(&self, id: Uuid, private: serde_json::Value) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.private = private;
        Ok(())
    }

    async fn update_user_email(&self, id: Uuid, email: &str) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.email = Some(email.to_owned());
        u.email_verified = false;
        Ok(())
    }

    async fn update_user_lang(&self, id: Uuid, lang: &str) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.lang = Some(lang.to_owned());
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.password_hash = password_hash.to_owned();
        Ok(())
    }

    async fn clear_must_change_password(&self, id: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.must_change_password = false;
        Ok(())
    }

    async fn set_last_seen(&self, id: Uuid, ts: DateTime<Utc>) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let u = s.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        u.last_seen = Some(ts);
        Ok(())
    }

    async fn get_last_seen(&self, id: Uuid) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().unwrap().users.get(&id).and_then(|u| u.last_seen))
    }

    async fn verify_email_token(&self, token: &str) -> StoreResult<bool> {
        // Out-of-scope collaborator stub: any non-empty token verifies the
        // first unverified user carrying it as their id prefix in this
        // in-memory backend, matching the thin-collaborator treatment of
        // auth/email in spec.md §1.
        let mut s = self.state.lock().unwrap();
        if token.is_empty() {
            return Ok(false);
        }
        for u in s.users.values_mut() {
            if u.id.to_string().starts_with(token) {
                u.email_verified = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn create_auth_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token_hash.to_vec(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_token(&self, token_hash: &[u8]) -> StoreResult<Option<Uuid>> {
        let s = self.state.lock().unwrap();
        Ok(s.tokens.get(token_hash).and_then(|(user_id, expires_at)| {
            if *expires_at > Utc::now() {
                Some(*user_id)
            } else {
                None
            }
        }))
    }

    async fn create_dm(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<(Uuid, bool)> {
        let mut s = self.state.lock().unwrap();
        let key = dm_key(user_a, user_b);
        if let Some(existing) = s.dm_index.get(&key) {
            return Ok((*existing, false));
        }
        let conv_id = Uuid::new_v4();
        let conv = Conversation {
            id: conv_id,
            kind: ConversationKind::Dm,
            owner: None,
            public_desc: None,
            pinned_seq: None,
            disappearing_ttl: None,
            no_screenshots: false,
            last_seq: 0,
            closed: false,
            created_at: Utc::now(),
        };
        s.conversations.insert(conv_id, conv);
        s.dm_index.insert(key, conv_id);
        for u in [user_a, user_b] {
            insert_member(&mut s, conv_id, u, MemberRole::Member);
        }
        Ok((conv_id, true))
    }

    async fn create_room(&self, owner: Uuid, public_desc: serde_json::Value) -> StoreResult<Uuid> {
        let mut s = self.state.lock().unwrap();
        let conv_id = Uuid::new_v4();
        let conv = Conversation {
            id: conv_id,
            kind: ConversationKind::Room,
            owner: Some(owner),
            public_desc: Some(public_desc),
            pinned_seq: None,
            disappearing_ttl: None,
            no_screenshots: false,
            last_seq: 0,
            closed: false,
            created_at: Utc::now(),
        };
        s.conversations.insert(conv_id, conv);
        insert_member(&mut s, conv_id, owner, MemberRole::Owner);
        Ok(conv_id)
    }

    async fn get_conversation(&self, conv: Uuid) -> StoreResult<Option<Conversation>> {
        Ok(self.state.lock().unwrap().conversations.get(&conv).cloned())
    }

    async fn is_member(&self, conv: Uuid, user: Uuid) -> StoreResult<bool> {
        let s = self.state.lock().unwrap();
        Ok(s.members
            .get(&(conv, user))
            .is_some_and(|m| m.left_at.is_none()))
    }

    async fn get_member(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Member>> {
        Ok(self.state.lock().unwrap().members.get(&(conv, user)).cloned())
    }

    async fn get_conversation_members(&self, conv: Uuid) -> StoreResult<Vec<Member>> {
        let s = self.state.lock().unwrap();
        Ok(s.conv_members
            .get(&conv)
            .map(|ids| {
                ids.iter()
                    .filter_map(|uid| s.members.get(&(conv, *uid)))
                    .filter(|m| m.left_at.is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_user_conversations(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<(Conversation, Member)>> {
        let s = self.state.lock().unwrap();
        let mut out: Vec<(Conversation, Member)> = s
            .user_convs
            .get(&user)
            .into_iter()
            .flatten()
            .filter_map(|conv_id| {
                let member = s.members.get(&(*conv_id, user))?;
                if member.left_at.is_some() {
                    return None;
                }
                let conv = s.conversations.get(conv_id)?;
                if let Some(before) = before {
                    if conv.created_at >= before {
                        return None;
                    }
                }
                Some((conv.clone(), member.clone()))
            })
            .collect();
        out.sort_by_key(|b| std::cmp::Reverse(b.0.created_at));
        out.truncate(limit.max(1) as usize);
        Ok(out)
    }

    async fn add_member(&self, conv: Uuid, user: Uuid, role: MemberRole) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        if !s.conversations.contains_key(&conv) {
            return Err(StoreError::NotFound);
        }
        insert_member(&mut s, conv, user, role);
        Ok(())
    }

    async fn remove_member(&self, conv: Uuid, user: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        if let Some(m) = s.members.get_mut(&(conv, user)) {
            m.left_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_member_settings(
        &self,
        conv: Uuid,
        user: Uuid,
        patch: MemberSettingsPatch,
    ) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let m = s.members.get_mut(&(conv, user)).ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.favorite {
            m.favorite = v;
        }
        if let Some(v) = patch.muted {
            m.muted = v;
        }
        if let Some(v) = patch.blocked {
            m.blocked = v;
        }
        if let Some(v) = patch.private_blob {
            m.private_blob = Some(v);
        }
        Ok(())
    }

    async fn update_conversation_descriptor(
        &self,
        conv: Uuid,
        patch: RoomDescriptorPatch,
    ) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let c = s.conversations.get_mut(&conv).ok_or(StoreError::NotFound)?;
        if let Some(d) = patch.public_desc {
            c.public_desc = Some(d);
        }
        if let Some(ttl) = patch.disappearing_ttl {
            c.disappearing_ttl = ttl;
        }
        if let Some(flag) = patch.no_screenshots {
            c.no_screenshots = flag;
        }
        Ok(())
    }

    async fn update_dm_disappearing_ttl(&self, conv: Uuid, ttl: Option<i64>) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let c = s.conversations.get_mut(&conv).ok_or(StoreError::NotFound)?;
        c.disappearing_ttl = ttl;
        Ok(())
    }

    async fn close_conversation(&self, conv: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let c = s.conversations.get_mut(&conv).ok_or(StoreError::NotFound)?;
        c.closed = true;
        Ok(())
    }

    async fn set_pinned_seq(&self, conv: Uuid, seq: Option<i64>) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let c = s.conversations.get_mut(&conv).ok_or(StoreError::NotFound)?;
        c.pinned_seq = seq;
        Ok(())
    }

    async fn is_blocked(&self, conv: Uuid, sender: Uuid) -> StoreResult<bool> {
        let s = self.state.lock().unwrap();
        let Some(other) = s
            .conv_members
            .get(&conv)
            .into_iter()
            .flatten()
            .find(|uid| **uid != sender)
        else {
            return Ok(false);
        };
        Ok(s.members.get(&(conv, *other)).is_some_and(|m| m.blocked))
    }

    async fn dm_other_user(&self, conv: Uuid, user: Uuid) -> StoreResult<Option<Uuid>> {
        let s = self.state.lock().unwrap();
        Ok(s.conv_members
            .get(&conv)
            .into_iter()
            .flatten()
            .find(|uid| **uid != user)
            .copied())
    }

    async fn update_read_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let mut s = self.state.lock().unwrap();
        let m = s.members.get_mut(&(conv, user)).ok_or(StoreError::NotFound)?;
        m.read_seq = m.read_seq.max(seq);
        Ok(m.read_seq)
    }

    async fn update_recv_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let mut s = self.state.lock().unwrap();
        let m = s.members.get_mut(&(conv, user)).ok_or(StoreError::NotFound)?;
        m.recv_seq = m.recv_seq.max(seq);
        Ok(m.recv_seq)
    }

    async fn update_clear_seq(&self, conv: Uuid, user: Uuid, seq: i64) -> StoreResult<i64> {
        let mut s = self.state.lock().unwrap();
        let m = s.members.get_mut(&(conv, user)).ok_or(StoreError::NotFound)?;
        m.clear_seq = m.clear_seq.max(seq);
        Ok(m.clear_seq)
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
        let mut s = self.state.lock().unwrap();
        let c = s.conversations.get_mut(&conv).ok_or(StoreError::NotFound)?;
        c.last_seq += 1;
        let seq = c.last_seq;
        let message = Message {
            conv_id: conv,
            seq,
            sender,
            content: content.to_owned(),
            reply_to,
            view_once,
            view_once_ttl,
            edit_count: 0,
            mentions: mentions.to_vec(),
            reactions: HashMap::new(),
            created_at: Utc::now(),
            deleted_at: None,
            deleted_for: Default::default(),
        };
        s.messages.entry(conv).or_default().insert(seq, message.clone());
        Ok(message)
    }

    async fn get_message(&self, conv: Uuid, seq: i64) -> StoreResult<Option<Message>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .get(&conv)
            .and_then(|m| m.get(&seq))
            .cloned())
    }

    async fn edit_message(&self, conv: Uuid, seq: i64, content: &str) -> StoreResult<Message> {
        let mut s = self.state.lock().unwrap();
        let m = s
            .messages
            .get_mut(&conv)
            .and_then(|m| m.get_mut(&seq))
            .ok_or(StoreError::NotFound)?;
        m.content = content.to_owned();
        m.edit_count += 1;
        Ok(m.clone())
    }

    async fn unsend_message(&self, conv: Uuid, seq: i64) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let m = s
            .messages
            .get_mut(&conv)
            .and_then(|m| m.get_mut(&seq))
            .ok_or(StoreError::NotFound)?;
        m.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_for_me(&self, conv: Uuid, seq: i64, user: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let m = s
            .messages
            .get_mut(&conv)
            .and_then(|m| m.get_mut(&seq))
            .ok_or(StoreError::NotFound)?;
        m.deleted_for.insert(user);
        Ok(())
    }

    async fn toggle_reaction(
        &self,
        conv: Uuid,
        seq: i64,
        user: Uuid,
        emoji: &str,
    ) -> StoreResult<bool> {
        let mut s = self.state.lock().unwrap();
        let m = s
            .messages
            .get_mut(&conv)
            .and_then(|m| m.get_mut(&seq))
            .ok_or(StoreError::NotFound)?;
        let users = m.reactions.entry(emoji.to_owned()).or_default();
        if users.remove(&user) {
            if users.is_empty() {
                m.reactions.remove(emoji);
            }
            Ok(false)
        } else {
            users.insert(user);
            Ok(true)
        }
    }

    async fn get_messages(
        &self,
        conv: Uuid,
        before_seq: Option<i64>,
        limit: u32,
        requesting_user: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let s = self.state.lock().unwrap();
        let clear_seq = s
            .members
            .get(&(conv, requesting_user))
            .map(|m| m.clear_seq)
            .unwrap_or(0);
        let mut msgs: Vec<Message> = s
            .messages
            .get(&conv)
            .into_iter()
            .flatten()
            .map(|(_, m)| m.clone())
            .filter(|m| m.seq > clear_seq)
            .filter(|m| !m.deleted_for.contains(&requesting_user))
            .filter(|m| before_seq.is_none_or(|before| m.seq < before))
            .collect();
        msgs.sort_by_key(|b| std::cmp::Reverse(b.seq));
        msgs.truncate(limit.max(1) as usize);
        Ok(msgs)
    }

    async fn get_mentions(
        &self,
        user: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>> {
        let s = self.state.lock().unwrap();
        let convs: std::collections::HashSet<Uuid> =
            s.user_convs.get(&user).into_iter().flatten().copied().collect();
        let mut msgs: Vec<Message> = s
            .messages
            .values()
            .flat_map(|by_seq| by_seq.values())
            .filter(|m| convs.contains(&m.conv_id))
            .filter(|m| m.mentions.contains(&user))
            .filter(|m| !m.deleted_for.contains(&user))
            .filter(|m| before.is_none_or(|before| m.created_at < before))
            .cloned()
            .collect();
        msgs.sort_by_key(|b| std::cmp::Reverse(b.created_at));
        msgs.truncate(limit.max(1) as usize);
        Ok(msgs)
    }

    async fn create_invite(
        &self,
        created_by: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> StoreResult<Invite> {
        let mut s = self.state.lock().unwrap();
        let invite = Invite {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            name: name.map(ToOwned::to_owned),
            code: Uuid::new_v4().simple().to_string(),
            created_by,
            created_at: Utc::now(),
            revoked_at: None,
            redeemed_by: None,
        };
        s.invites_by_code.insert(invite.code.clone(), invite.id);
        s.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn list_invites(&self, created_by: Uuid) -> StoreResult<Vec<Invite>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invites
            .values()
            .filter(|i| i.created_by == created_by)
            .cloned()
            .collect())
    }

    async fn revoke_invite(&self, id: Uuid, created_by: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let invite = s.invites.get_mut(&id).ok_or(StoreError::NotFound)?;
        if invite.created_by != created_by {
            return Err(StoreError::NotFound);
        }
        invite.revoked_at = Some(Utc::now());
        Ok(())
    }

    async fn redeem_invite(&self, code: &str, redeemed_by: Uuid) -> StoreResult<Option<Invite>> {
        let mut s = self.state.lock().unwrap();
        let Some(id) = s.invites_by_code.get(code).copied() else {
            return Ok(None);
        };
        let invite = s.invites.get_mut(&id).ok_or(StoreError::NotFound)?;
        if invite.revoked_at.is_some() || invite.redeemed_by.is_some() {
            return Ok(None);
        }
        invite.redeemed_by = Some(redeemed_by);
        Ok(Some(invite.clone()))
    }

    async fn add_contact(
        &self,
        owner: Uuid,
        user: Uuid,
        nickname: Option<&str>,
    ) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        let list = s.contacts.entry(owner).or_default();
        if let Some(existing) = list.iter_mut().find(|c| c.user_id == user) {
            existing.nickname = nickname.map(ToOwned::to_owned);
        } else {
            list.push(Contact {
                owner,
                user_id: user,
                nickname: nickname.map(ToOwned::to_owned),
            });
        }
        Ok(())
    }

    async fn remove_contact(&self, owner: Uuid, user: Uuid) -> StoreResult<()> {
        let mut s = self.state.lock().unwrap();
        if let Some(list) = s.contacts.get_mut(&owner) {
            list.retain(|c| c.user_id != user);
        }
        Ok(())
    }

    async fn list_contacts(&self, owner: Uuid) -> StoreResult<Vec<Contact>> {
        Ok(self.state.lock().unwrap().contacts.get(&owner).cloned().unwrap_or_default())
    }
}

fn insert_member(s: &mut State, conv: Uuid, user: Uuid, role: MemberRole) {
    let member = Member {
        conv_id: conv,
        user_id: user,
        role,
        favorite: false,
        muted: false,
        blocked: false,
        private_blob: None,
        clear_seq: 0,
        read_seq: 0,
        recv_seq: 0,
        joined_at: Utc::now(),
        left_at: None,
    };
    s.members.insert((conv, user), member);
    s.conv_members.entry(conv).or_default().push(user);
    s.user_convs.entry(user).or_default().push(conv);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seq_is_monotonic_under_concurrent_senders() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let u1 = store.create_user("a", "h", None, None).await.unwrap().id;
        let u2 = store.create_user("b", "h", None, None).await.unwrap().id;
        let (conv, _) = store.create_dm(u1, u2).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            let sender = if i % 2 == 0 { u1 } else { u2 };
            handles.push(tokio::spawn(async move {
                store
                    .create_message(conv, sender, "x", None, false, None, &[])
                    .await
                    .unwrap()
                    .seq
            }));
        }
        let mut seqs: Vec<i64> = Vec::new();
        for h in handles {
            seqs.push(h.await.unwrap());
        }
        seqs.sort_unstable();
        let expected: Vec<i64> = (1..=50).collect();
        assert_eq!(seqs, expected);
    }

    #[tokio::test]
    async fn reaction_toggle_is_idempotent_pair() {
        let store = InMemoryStore::new();
        let u1 = store.create_user("a", "h", None, None).await.unwrap().id;
        let u2 = store.create_user("b", "h", None, None).await.unwrap().id;
        let (conv, _) = store.create_dm(u1, u2).await.unwrap();
        let msg = store
            .create_message(conv, u1, "hi", None, false, None, &[])
            .await
            .unwrap();
        assert!(store.toggle_reaction(conv, msg.seq, u2, "👍").await.unwrap());
        assert!(!store.toggle_reaction(conv, msg.seq, u2, "👍").await.unwrap());
        let again = store.get_message(conv, msg.seq).await.unwrap().unwrap();
        assert!(!again.reactions.contains_key("👍"));
    }

    #[tokio::test]
    async fn dm_creation_is_idempotent() {
        let store = InMemoryStore::new();
        let u1 = store.create_user("a", "h", None, None).await.unwrap().id;
        let u2 = store.create_user("b", "h", None, None).await.unwrap().id;
        let (conv1, created1) = store.create_dm(u1, u2).await.unwrap();
        let (conv2, created2) = store.create_dm(u2, u1).await.unwrap();
        assert!(created1);
        assert!(!created2);
        assert_eq!(conv1, conv2);
    }
}
