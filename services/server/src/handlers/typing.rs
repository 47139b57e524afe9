use std::sync::Arc;

use chat_protocol::{ConvRefPayload, InfoWhat};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// No control reply: typing is fire-and-forget, broadcast only.
pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    payload: ConvRefPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    super::broadcast_info(
        state,
        payload.conv,
        self_id,
        InfoWhat::Typing,
        None,
        None,
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}
