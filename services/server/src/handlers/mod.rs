//! One handler family per client opcode (spec.md §4.6). Each handler
//! timeboxes its Store calls (enforced by the dispatcher's outer timeout),
//! validates inputs, calls the Store, crafts a control response, and asks
//! the Hub to fan out a broadcast event.

pub mod acc;
pub mod clear;
pub mod contact;
pub mod delete;
pub mod dm;
pub mod edit;
pub mod get;
pub mod hi;
pub mod invite;
pub mod login;
pub mod pin;
pub mod react;
pub mod receipts;
pub mod room;
pub mod search;
pub mod send;
pub mod typing;
pub mod unsend;

use chat_protocol::{Info, InfoWhat, ServerFrame};
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Validates the caller is a current member of `conv`; distinguishes
/// not-found (no such conversation) from forbidden (not a member).
pub(crate) async fn require_membership(state: &AppState, conv: Uuid, user: Uuid) -> Result<(), AppError> {
    if state
        .store
        .get_conversation(conv)
        .await
        .map_err(crate::error::map_store_err)?
        .is_none()
    {
        return Err(AppError::NotFound);
    }
    if !state
        .store
        .is_member(conv, user)
        .await
        .map_err(crate::error::map_store_err)?
    {
        return Err(AppError::Forbidden("not a member".into()));
    }
    Ok(())
}

pub(crate) fn require_self(session_user: Uuid, other: Uuid, message: &str) -> Result<(), AppError> {
    if session_user != other {
        return Err(AppError::Forbidden(message.to_owned()));
    }
    Ok(())
}

/// Broadcasts an `info` event to every current member of `conv`, skipping
/// `skip_session` (the originating session, per multi-device sync rules).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn broadcast_info(
    state: &AppState,
    conv: Uuid,
    from: Uuid,
    what: InfoWhat,
    seq: Option<i64>,
    content: Option<String>,
    emoji: Option<String>,
    skip_session: Option<Uuid>,
) -> Result<(), AppError> {
    let members = state
        .store
        .get_conversation_members(conv)
        .await
        .map_err(crate::error::map_store_err)?;
    let user_ids: Vec<Uuid> = members.into_iter().map(|m| m.user_id).collect();
    let frame = ServerFrame::info(Info {
        conv,
        from,
        what,
        seq,
        content,
        emoji,
        ts: Utc::now(),
    });
    state.hub.send_to_users(&user_ids, frame, skip_session).await;
    Ok(())
}

/// Like [`broadcast_info`], but fans out to an explicit recipient list
/// instead of querying current conversation membership. Needed when the
/// membership the broadcast describes no longer matches the Store by the
/// time the broadcast happens (e.g. a just-kicked member must still hear
/// about their own kick, even though `get_conversation_members` no longer
/// lists them).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn broadcast_info_to(
    state: &AppState,
    recipients: &[Uuid],
    conv: Uuid,
    from: Uuid,
    what: InfoWhat,
    seq: Option<i64>,
    content: Option<String>,
    emoji: Option<String>,
    skip_session: Option<Uuid>,
) {
    let frame = ServerFrame::info(Info {
        conv,
        from,
        what,
        seq,
        content,
        emoji,
        ts: Utc::now(),
    });
    state.hub.send_to_users(recipients, frame, skip_session).await;
}
