use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, GetPayload, ServerFrame};
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: GetPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    let limit = payload.limit.unwrap_or(DEFAULT_LIMIT);
    let before_ts = payload
        .before
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    let params = match payload.what.as_str() {
        "conversations" => conversations(state, self_id, before_ts, limit).await?,
        "conversation" => conversation(state, self_id, &payload).await?,
        "messages" => messages(state, self_id, &payload, limit).await?,
        "members" => members(state, self_id, &payload).await?,
        "receipts" => receipts(state, self_id, &payload).await?,
        "contacts" => contacts(state, self_id).await?,
        "mentions" => mentions(state, self_id, before_ts, limit).await?,
        "user" => user(state, &payload).await?,
        other => return Err(AppError::BadRequest(format!("unknown get what {other}"))),
    };

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok).with_params(params)));
    Ok(())
}

async fn conversations(
    state: &AppState,
    self_id: uuid::Uuid,
    before: Option<DateTime<Utc>>,
    limit: u32,
) -> Result<serde_json::Value, AppError> {
    let rows = state.store.get_user_conversations(self_id, before, limit).await.map_err(crate::error::map_store_err)?;
    let items: Vec<_> = rows
        .into_iter()
        .map(|(conv, member)| {
            serde_json::json!({
                "conv": conv.id,
                "kind": conv.kind,
                "desc": conv.public_desc,
                "pinnedSeq": conv.pinned_seq,
                "lastSeq": conv.last_seq,
                "favorite": member.favorite,
                "muted": member.muted,
                "readSeq": member.read_seq,
                "recvSeq": member.recv_seq,
                "clearSeq": member.clear_seq,
            })
        })
        .collect();
    Ok(serde_json::json!({"conversations": items}))
}

async fn conversation(
    state: &AppState,
    self_id: uuid::Uuid,
    payload: &GetPayload,
) -> Result<serde_json::Value, AppError> {
    let conv_id = payload.conv.ok_or_else(|| AppError::BadRequest("conv required".into()))?;
    super::require_membership(state, conv_id, self_id).await?;
    let conv = state.store.get_conversation(conv_id).await.map_err(crate::error::map_store_err)?.ok_or(AppError::NotFound)?;
    Ok(serde_json::json!({
        "conv": conv.id,
        "kind": conv.kind,
        "desc": conv.public_desc,
        "pinnedSeq": conv.pinned_seq,
        "disappearingTTL": conv.disappearing_ttl,
        "noScreenshots": conv.no_screenshots,
        "lastSeq": conv.last_seq,
        "closed": conv.closed,
    }))
}

async fn messages(
    state: &AppState,
    self_id: uuid::Uuid,
    payload: &GetPayload,
    limit: u32,
) -> Result<serde_json::Value, AppError> {
    let conv_id = payload.conv.ok_or_else(|| AppError::BadRequest("conv required".into()))?;
    super::require_membership(state, conv_id, self_id).await?;
    let msgs = state
        .store
        .get_messages(conv_id, payload.before, limit, self_id)
        .await
        .map_err(crate::error::map_store_err)?;
    let items: Vec<_> = msgs
        .into_iter()
        .map(|m| {
            let content = if m.deleted_at.is_some() {
                None
            } else {
                state.codec.open(&m.content).ok().and_then(|bytes| String::from_utf8(bytes).ok())
            };
            serde_json::json!({
                "seq": m.seq,
                "sender": m.sender,
                "content": content,
                "replyTo": m.reply_to,
                "viewOnce": m.view_once,
                "editCount": m.edit_count,
                "mentions": m.mentions,
                "reactions": m.reactions,
                "unsent": m.deleted_at.is_some(),
                "ts": m.created_at,
            })
        })
        .collect();
    Ok(serde_json::json!({"messages": items}))
}

async fn members(
    state: &AppState,
    self_id: uuid::Uuid,
    payload: &GetPayload,
) -> Result<serde_json::Value, AppError> {
    let conv_id = payload.conv.ok_or_else(|| AppError::BadRequest("conv required".into()))?;
    super::require_membership(state, conv_id, self_id).await?;
    let members = state.store.get_conversation_members(conv_id).await.map_err(crate::error::map_store_err)?;
    let items: Vec<_> = members
        .into_iter()
        .map(|m| {
            serde_json::json!({
                "user": m.user_id,
                "role": m.role,
                "favorite": m.favorite,
                "muted": m.muted,
                "blocked": m.blocked,
                "joinedAt": m.joined_at,
            })
        })
        .collect();
    Ok(serde_json::json!({"members": items}))
}

async fn receipts(
    state: &AppState,
    self_id: uuid::Uuid,
    payload: &GetPayload,
) -> Result<serde_json::Value, AppError> {
    let conv_id = payload.conv.ok_or_else(|| AppError::BadRequest("conv required".into()))?;
    super::require_membership(state, conv_id, self_id).await?;
    let members = state.store.get_conversation_members(conv_id).await.map_err(crate::error::map_store_err)?;
    let items: Vec<_> = members
        .into_iter()
        .map(|m| {
            serde_json::json!({
                "user": m.user_id,
                "readSeq": m.read_seq,
                "recvSeq": m.recv_seq,
            })
        })
        .collect();
    Ok(serde_json::json!({"receipts": items}))
}

async fn contacts(state: &AppState, self_id: uuid::Uuid) -> Result<serde_json::Value, AppError> {
    let contacts = state.store.list_contacts(self_id).await.map_err(crate::error::map_store_err)?;
    let items: Vec<_> = contacts
        .into_iter()
        .map(|c| serde_json::json!({"user": c.user_id, "nickname": c.nickname}))
        .collect();
    Ok(serde_json::json!({"contacts": items}))
}

async fn mentions(
    state: &AppState,
    self_id: uuid::Uuid,
    before: Option<DateTime<Utc>>,
    limit: u32,
) -> Result<serde_json::Value, AppError> {
    let msgs = state.store.get_mentions(self_id, before, limit).await.map_err(crate::error::map_store_err)?;
    let items: Vec<_> = msgs
        .into_iter()
        .map(|m| {
            let content = state.codec.open(&m.content).ok().and_then(|bytes| String::from_utf8(bytes).ok());
            serde_json::json!({
                "conv": m.conv_id,
                "seq": m.seq,
                "sender": m.sender,
                "content": content,
                "ts": m.created_at,
            })
        })
        .collect();
    Ok(serde_json::json!({"mentions": items}))
}

async fn user(state: &AppState, payload: &GetPayload) -> Result<serde_json::Value, AppError> {
    let user_id = payload.user.ok_or_else(|| AppError::BadRequest("user required".into()))?;
    let user = state.store.get_user(user_id).await.map_err(crate::error::map_store_err)?.ok_or(AppError::NotFound)?;
    Ok(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "public": user.public,
        "lastSeen": user.last_seen,
    }))
}
