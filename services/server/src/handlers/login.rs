use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, LoginPayload, LoginScheme, ServerFrame};
use chrono::Utc;

use crate::auth;
use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use crate::store::User;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: LoginPayload,
) -> Result<(), AppError> {
    let user = match payload.scheme {
        LoginScheme::Basic => {
            let (username, password) = auth::decode_basic_secret(&payload.secret)
                .ok_or_else(|| AppError::BadRequest("bad base64".into()))?;
            let user = state
                .store
                .get_user_by_username(&username)
                .await
                .map_err(crate::error::map_store_err)?
                .ok_or(AppError::Unauthorized)?;
            if !auth::verify_password(&password, &user.password_hash) {
                return Err(AppError::Unauthorized);
            }
            user
        }
        LoginScheme::Token => {
            let user_id = auth::validate_token(&*state.store, &payload.secret)
                .await
                .ok_or(AppError::Unauthorized)?;
            state
                .store
                .get_user(user_id)
                .await
                .map_err(crate::error::map_store_err)?
                .ok_or(AppError::Unauthorized)?
        }
    };

    complete_login(session, state, id, user).await
}

pub(crate) async fn complete_login(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    user: User,
) -> Result<(), AppError> {
    let (token, expires_at) = auth::mint_token(&*state.store, user.id)
        .await
        .map_err(crate::error::map_store_err)?;
    session.set_user_id(user.id).await;
    state.hub.authenticate_session(session.id, user.id).await;
    state.store.set_last_seen(user.id, Utc::now()).await.map_err(crate::error::map_store_err)?;

    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({
            "userId": user.id,
            "token": token,
            "expiresAt": expires_at,
            "emailVerified": user.email_verified,
            "mustChangePassword": user.must_change_password,
            "public": user.public,
        })),
    ));
    Ok(())
}
