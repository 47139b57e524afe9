use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, InvitePayload, ServerFrame};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: InvitePayload,
) -> Result<(), AppError> {
    let self_id = session.user_id().await.ok_or(AppError::Unauthorized)?;

    if let Some(create) = payload.create {
        let invite = state
            .store
            .create_invite(self_id, &create.email, create.name.as_deref())
            .await
            .map_err(crate::error::map_store_err)?;
        session.send(ServerFrame::ctrl(
            Ctrl::new(id, CtrlCode::Created).with_params(serde_json::json!({
                "id": invite.id,
                "code": invite.code,
            })),
        ));
        return Ok(());
    }

    if payload.list.unwrap_or(false) {
        let invites = state.store.list_invites(self_id).await.map_err(crate::error::map_store_err)?;
        let summaries: Vec<_> = invites
            .into_iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "email": i.email,
                    "name": i.name,
                    "revoked": i.revoked_at.is_some(),
                    "redeemedBy": i.redeemed_by,
                })
            })
            .collect();
        session.send(ServerFrame::ctrl(
            Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({"invites": summaries})),
        ));
        return Ok(());
    }

    if let Some(invite_id) = payload.revoke {
        state.store.revoke_invite(invite_id, self_id).await.map_err(crate::error::map_store_err)?;
        session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
        return Ok(());
    }

    if let Some(code) = payload.redeem {
        let invite = state
            .store
            .redeem_invite(&code, self_id)
            .await
            .map_err(crate::error::map_store_err)?
            .ok_or(AppError::NotFound)?;
        session.send(ServerFrame::ctrl(
            Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({"id": invite.id})),
        ));
        return Ok(());
    }

    Err(AppError::BadRequest("invite requires create/list/revoke/redeem".into()))
}
