use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, DeletePayload, InfoWhat, ServerFrame};
use chrono::Utc;

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: DeletePayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    if payload.for_everyone.unwrap_or(false) {
        let message = state
            .store
            .get_message(payload.conv, payload.seq)
            .await
            .map_err(crate::error::map_store_err)?
            .ok_or(AppError::NotFound)?;
        super::require_self(self_id, message.sender, "not the sender")?;
        if Utc::now() - message.created_at > state.config.unsend_window {
            return Err(AppError::Forbidden("delete window expired".into()));
        }
        state.store.unsend_message(payload.conv, payload.seq).await.map_err(crate::error::map_store_err)?;
        session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
        super::broadcast_info(
            state,
            payload.conv,
            self_id,
            InfoWhat::Delete,
            Some(payload.seq),
            None,
            None,
            Some(session.id),
        )
        .await?;
        return Ok(());
    }

    state.store.delete_for_me(payload.conv, payload.seq, self_id).await.map_err(crate::error::map_store_err)?;
    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    Ok(())
}
