use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, InfoWhat, SeqRefPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// `seq == 0` clears the pin; any positive seq pins that message
/// (spec.md §4.6.10 leaves the clear sentinel unspecified).
pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SeqRefPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    let clearing = payload.seq == 0;
    if !clearing {
        state
            .store
            .get_message(payload.conv, payload.seq)
            .await
            .map_err(crate::error::map_store_err)?
            .ok_or(AppError::NotFound)?;
    }
    state
        .store
        .set_pinned_seq(payload.conv, if clearing { None } else { Some(payload.seq) })
        .await
        .map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info(
        state,
        payload.conv,
        self_id,
        if clearing { InfoWhat::Unpin } else { InfoWhat::Pin },
        if clearing { None } else { Some(payload.seq) },
        None,
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}
