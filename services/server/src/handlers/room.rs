use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, InfoWhat, RoomPayload, ServerFrame};
use uuid::Uuid;

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use crate::store::{MemberRole, RoomDescriptorPatch};

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;

    match payload.action.as_str() {
        "create" => create(session, state, id, self_id, payload).await,
        "invite" => invite(session, state, id, self_id, payload).await,
        "leave" => leave(session, state, id, self_id, payload).await,
        "kick" => kick(session, state, id, self_id, payload).await,
        "update" => update(session, state, id, self_id, payload).await,
        other => Err(AppError::BadRequest(format!("unknown room action {other}"))),
    }
}

fn parse_room_id(payload: &RoomPayload) -> Result<Uuid, AppError> {
    payload
        .id
        .parse()
        .map_err(|_| AppError::BadRequest("invalid room id".into()))
}

async fn require_owner_or_admin(state: &AppState, conv: Uuid, user: Uuid) -> Result<(), AppError> {
    let member = state
        .store
        .get_member(conv, user)
        .await
        .map_err(crate::error::map_store_err)?
        .ok_or(AppError::Forbidden("not a member".into()))?;
    if !matches!(member.role, MemberRole::Owner | MemberRole::Admin) {
        return Err(AppError::Forbidden("owner or admin required".into()));
    }
    Ok(())
}

async fn create(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: Uuid,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let desc = payload.desc.unwrap_or(serde_json::json!({}));
    let conv = state.store.create_room(self_id, desc).await.map_err(crate::error::map_store_err)?;
    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Created).with_params(serde_json::json!({"conv": conv})),
    ));
    Ok(())
}

async fn invite(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: Uuid,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let conv = parse_room_id(&payload)?;
    require_owner_or_admin(state, conv, self_id).await?;
    let target = payload.user.ok_or_else(|| AppError::BadRequest("user required".into()))?;

    state.store.add_member(conv, target, MemberRole::Member).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info(
        state,
        conv,
        target,
        InfoWhat::MemberJoined,
        None,
        None,
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}

async fn leave(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: Uuid,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let conv = parse_room_id(&payload)?;
    super::require_membership(state, conv, self_id).await?;

    state.store.remove_member(conv, self_id).await.map_err(crate::error::map_store_err)?;
    let remaining = state.store.get_conversation_members(conv).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    if remaining.is_empty() {
        state.store.close_conversation(conv).await.map_err(crate::error::map_store_err)?;
    } else {
        super::broadcast_info(
            state,
            conv,
            self_id,
            InfoWhat::MemberLeft,
            None,
            None,
            None,
            Some(session.id),
        )
        .await?;
    }
    Ok(())
}

async fn kick(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: Uuid,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let conv = parse_room_id(&payload)?;
    require_owner_or_admin(state, conv, self_id).await?;
    let target = payload.user.ok_or_else(|| AppError::BadRequest("user required".into()))?;

    // Capture membership before removal so the kicked user is still a
    // broadcast recipient — `get_conversation_members` would no longer
    // list them afterwards.
    let recipients: Vec<Uuid> = state
        .store
        .get_conversation_members(conv)
        .await
        .map_err(crate::error::map_store_err)?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    state.store.remove_member(conv, target).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info_to(
        state,
        &recipients,
        conv,
        target,
        InfoWhat::MemberKicked,
        None,
        None,
        None,
        Some(session.id),
    )
    .await;
    Ok(())
}

async fn update(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: Uuid,
    payload: RoomPayload,
) -> Result<(), AppError> {
    let conv = parse_room_id(&payload)?;
    require_owner_or_admin(state, conv, self_id).await?;

    let patch = RoomDescriptorPatch {
        public_desc: payload.desc,
        disappearing_ttl: payload.disappearing_ttl.map(Some),
        no_screenshots: payload.no_screenshots,
    };
    state.store.update_conversation_descriptor(conv, patch).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info(
        state,
        conv,
        self_id,
        InfoWhat::RoomUpdated,
        None,
        None,
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}
