use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, EditPayload, InfoWhat, ServerFrame};
use chrono::Utc;

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: EditPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    let message = state
        .store
        .get_message(payload.conv, payload.seq)
        .await
        .map_err(crate::error::map_store_err)?
        .ok_or(AppError::NotFound)?;
    super::require_self(self_id, message.sender, "not the sender")?;

    if Utc::now() - message.created_at > state.config.edit_window {
        return Err(AppError::Forbidden("edit window expired".into()));
    }
    if message.edit_count >= state.config.edit_max {
        return Err(AppError::Forbidden("edit limit reached".into()));
    }

    let sealed = state.codec.seal(payload.content.as_bytes());
    state.store.edit_message(payload.conv, payload.seq, &sealed).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info(
        state,
        payload.conv,
        self_id,
        InfoWhat::Edit,
        Some(payload.seq),
        Some(sealed),
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}
