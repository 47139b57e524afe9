use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, InfoWhat, SeqRefPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// `read` and `recv` share shape: a monotonic seq watermark per member,
/// broadcast to the rest of the conversation so every device can update its
/// "seen by" / "delivered to" indicators (spec.md §4.6.3's Open Question —
/// resolved in favor of full-conversation fanout, not sender-only).
pub async fn handle_read(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SeqRefPayload,
) -> Result<(), AppError> {
    handle(session, state, id, payload, InfoWhat::Read, |s, c, u, seq| {
        s.store.update_read_seq(c, u, seq)
    })
    .await
}

pub async fn handle_recv(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SeqRefPayload,
) -> Result<(), AppError> {
    handle(session, state, id, payload, InfoWhat::Recv, |s, c, u, seq| {
        s.store.update_recv_seq(c, u, seq)
    })
    .await
}

async fn handle<'a, F, Fut>(
    session: &Arc<Session>,
    state: &'a AppState,
    id: Option<String>,
    payload: SeqRefPayload,
    what: InfoWhat,
    update: F,
) -> Result<(), AppError>
where
    F: FnOnce(&'a AppState, uuid::Uuid, uuid::Uuid, i64) -> Fut,
    Fut: std::future::Future<Output = crate::store::StoreResult<i64>>,
{
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;
    super::require_membership(state, payload.conv, self_id).await?;

    let watermark = update(state, payload.conv, self_id, payload.seq)
        .await
        .map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    super::broadcast_info(
        state,
        payload.conv,
        self_id,
        what,
        Some(watermark),
        None,
        None,
        Some(session.id),
    )
    .await?;
    Ok(())
}
