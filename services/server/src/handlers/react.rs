use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, InfoWhat, ReactPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: ReactPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    state
        .store
        .get_message(payload.conv, payload.seq)
        .await
        .map_err(crate::error::map_store_err)?
        .ok_or(AppError::NotFound)?;

    let added = state
        .store
        .toggle_reaction(payload.conv, payload.seq, self_id, &payload.emoji)
        .await
        .map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({"added": added})),
    ));
    super::broadcast_info(
        state,
        payload.conv,
        self_id,
        InfoWhat::React,
        Some(payload.seq),
        None,
        Some(payload.emoji),
        Some(session.id),
    )
    .await?;
    Ok(())
}
