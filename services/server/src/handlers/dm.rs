use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, DmPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use crate::store::MemberSettingsPatch;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: DmPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;

    if let Some(other) = payload.user {
        return start_or_fetch(session, state, id, self_id, other).await;
    }
    if let Some(conv) = payload.conv {
        return manage(state, id, session, self_id, conv, payload).await;
    }
    Err(AppError::BadRequest("dm requires user or conv".into()))
}

async fn start_or_fetch(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    self_id: uuid::Uuid,
    other: uuid::Uuid,
) -> Result<(), AppError> {
    if other == self_id {
        return Err(AppError::BadRequest("cannot DM yourself".into()));
    }
    let other_user = state.store.get_user(other).await.map_err(crate::error::map_store_err)?.ok_or(AppError::NotFound)?;
    let (conv, created) = state.store.create_dm(self_id, other).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(
        Ctrl::new(
            id,
            if created { CtrlCode::Created } else { CtrlCode::Ok },
        )
        .with_params(serde_json::json!({
            "conv": conv,
            "created": created,
            "user": {"id": other_user.id, "username": other_user.username, "public": other_user.public},
        })),
    ));
    Ok(())
}

async fn manage(
    state: &AppState,
    id: Option<String>,
    session: &Arc<Session>,
    self_id: uuid::Uuid,
    conv: uuid::Uuid,
    payload: DmPayload,
) -> Result<(), AppError> {
    super::require_membership(state, conv, self_id).await?;

    let patch = MemberSettingsPatch {
        favorite: payload.favorite,
        muted: payload.muted,
        blocked: payload.blocked,
        private_blob: payload.private,
    };
    state.store.update_member_settings(conv, self_id, patch).await.map_err(crate::error::map_store_err)?;

    if let Some(ttl) = payload.disappearing_ttl {
        state
            .store
            .update_dm_disappearing_ttl(conv, Some(ttl))
            .await
            .map_err(crate::error::map_store_err)?;
    }

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    Ok(())
}
