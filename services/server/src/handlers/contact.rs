use std::sync::Arc;

use chat_protocol::{ContactPayload, Ctrl, CtrlCode, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: ContactPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    let target = payload.user.ok_or_else(|| AppError::BadRequest("user required".into()))?;

    if payload.add.unwrap_or(false) {
        state
            .store
            .add_contact(self_id, target, payload.nickname.as_deref())
            .await
            .map_err(crate::error::map_store_err)?;
    } else if payload.remove.unwrap_or(false) {
        state.store.remove_contact(self_id, target).await.map_err(crate::error::map_store_err)?;
    } else {
        return Err(AppError::BadRequest("contact requires add or remove".into()));
    }

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    Ok(())
}
