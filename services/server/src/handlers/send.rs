use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, Data, SendPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SendPayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    if state.store.is_blocked(payload.conv, self_id).await.map_err(crate::error::map_store_err)? {
        return Err(AppError::Forbidden("blocked".into()));
    }

    let sealed = state.codec.seal(payload.content.as_bytes());
    let mentions = payload.mentions.clone().unwrap_or_default();
    let message = state
        .store
        .create_message(
            payload.conv,
            self_id,
            &sealed,
            payload.reply_to,
            payload.view_once.unwrap_or(false),
            payload.view_once_ttl,
            &mentions,
        )
        .await
        .map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Accepted).with_params(serde_json::json!({"seq": message.seq})),
    ));

    let members = state.store.get_conversation_members(payload.conv).await.map_err(crate::error::map_store_err)?;
    let user_ids: Vec<_> = members.into_iter().map(|m| m.user_id).collect();
    let head = if message.mentions.is_empty() {
        None
    } else {
        Some(serde_json::json!({"mentions": message.mentions}))
    };
    let data_frame = ServerFrame::data(Data {
        conv: payload.conv,
        seq: message.seq,
        from: self_id,
        content: sealed,
        head,
        ts: message.created_at,
    });
    // The originating session already has the seq via the ctrl reply above;
    // its other devices still need the data frame for multi-device sync.
    state.hub.send_to_users(&user_ids, data_frame, Some(session.id)).await;

    Ok(())
}
