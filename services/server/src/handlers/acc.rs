use std::sync::Arc;

use base64::Engine;
use chat_protocol::{AccPayload, Ctrl, CtrlCode, ServerFrame};

use crate::auth;
use crate::error::AppError;
use crate::handlers::login::complete_login;
use crate::session::Session;
use crate::state::AppState;
use crate::store::StoreError;

pub async fn handle(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: AccPayload,
) -> Result<(), AppError> {
    match payload.user.as_str() {
        "new" => create(session, state, id, payload).await,
        "me" => update(session, state, id, payload).await,
        _ => Err(AppError::BadRequest("user must be \"new\" or \"me\"".into())),
    }
}

async fn create(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: AccPayload,
) -> Result<(), AppError> {
    let username = payload
        .login
        .ok_or_else(|| AppError::BadRequest("login required".into()))?;
    let secret = payload
        .secret
        .ok_or_else(|| AppError::BadRequest("secret required".into()))?;
    let password = base64::engine::general_purpose::STANDARD
        .decode(&secret)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .ok_or_else(|| AppError::BadRequest("bad base64".into()))?;

    let password_hash = auth::hash_password(&password);
    let (public, private) = payload
        .desc
        .map(|d| (d.public.unwrap_or(serde_json::json!({})), d.private.unwrap_or(serde_json::json!({}))))
        .unwrap_or((serde_json::json!({}), serde_json::json!({})));

    let user = match state
        .store
        .create_user(&username, &password_hash, payload.email.as_deref(), payload.lang.as_deref())
        .await
    {
        Ok(user) => user,
        Err(StoreError::Conflict(msg)) => return Err(AppError::Conflict(msg)),
        Err(e) => return Err(crate::error::map_store_err(e)),
    };
    if !matches!(public, serde_json::Value::Null) {
        state.store.update_user_public(user.id, public).await.map_err(crate::error::map_store_err)?;
    }
    if !matches!(private, serde_json::Value::Null) {
        state.store.update_user_private(user.id, private).await.map_err(crate::error::map_store_err)?;
    }
    if let Some(code) = &payload.invite_code {
        // Best-effort: invite redemption failing does not block account
        // creation, which already succeeded above.
        let _ = state.store.redeem_invite(code, user.id).await;
    }

    complete_login(session, state, id, user).await
}

async fn update(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    payload: AccPayload,
) -> Result<(), AppError> {
    let user_id = session.user_id().await.ok_or(AppError::Unauthorized)?;

    if let Some(desc) = payload.desc {
        if let Some(public) = desc.public {
            state.store.update_user_public(user_id, public).await.map_err(crate::error::map_store_err)?;
        }
        if let Some(private) = desc.private {
            state.store.update_user_private(user_id, private).await.map_err(crate::error::map_store_err)?;
        }
    }
    if let Some(email) = &payload.email {
        state.store.update_user_email(user_id, email).await.map_err(crate::error::map_store_err)?;
    }
    if let Some(lang) = &payload.lang {
        state.store.update_user_lang(user_id, lang).await.map_err(crate::error::map_store_err)?;
    }
    if let Some(new_secret) = &payload.secret {
        let current_secret = payload
            .current_secret
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("currentSecret required".into()))?;
        let user = state.store.get_user(user_id).await.map_err(crate::error::map_store_err)?.ok_or(AppError::NotFound)?;
        let current_password = base64::engine::general_purpose::STANDARD
            .decode(current_secret)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .ok_or_else(|| AppError::BadRequest("bad base64".into()))?;
        if !auth::verify_password(&current_password, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }
        let new_password = base64::engine::general_purpose::STANDARD
            .decode(new_secret)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .ok_or_else(|| AppError::BadRequest("bad base64".into()))?;
        state
            .store
            .update_password_hash(user_id, &auth::hash_password(&new_password))
            .await
            .map_err(crate::error::map_store_err)?;
        state.store.clear_must_change_password(user_id).await.map_err(crate::error::map_store_err)?;
    }

    session.send(ServerFrame::ctrl(Ctrl::new(id, CtrlCode::Ok)));
    Ok(())
}
