use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, SearchPayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 20;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: SearchPayload,
) -> Result<(), AppError> {
    let users = state
        .store
        .search_users(&payload.query, payload.limit.unwrap_or(DEFAULT_LIMIT))
        .await
        .map_err(crate::error::map_store_err)?;

    let summaries: Vec<_> = users
        .into_iter()
        .map(|u| serde_json::json!({"id": u.id, "username": u.username, "public": u.public}))
        .collect();

    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({"users": summaries})),
    ));
    Ok(())
}
