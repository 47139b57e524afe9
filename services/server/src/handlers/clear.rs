use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, SeqRefPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// Per-member local clear watermark; never broadcast, it has no bearing on
/// any other member's view of the conversation.
pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SeqRefPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    state.store.update_clear_seq(payload.conv, self_id, payload.seq).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    Ok(())
}
