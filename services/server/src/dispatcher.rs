//! Parses and validates the client frame envelope before routing to a
//! handler (spec.md §4.5). Single-opcode, hi-first, and auth-gate
//! enforcement live here rather than in serde so a malformed frame can
//! still yield its `id` for the error reply.

use std::sync::Arc;

use chat_protocol::{ClientFrame, Ctrl, ServerFrame};
use tracing::error;

use crate::error::AppError;
use crate::handlers;
use crate::session::Session;
use crate::state::AppState;

const STATEFUL_OPCODES_EXEMPT_FROM_ID: &[&str] = &["hi", "login", "acc"];

pub async fn dispatch(session: Arc<Session>, frame: ClientFrame, state: &AppState) {
    let id = frame.id.clone();
    let opcodes = frame.present_opcodes();

    if opcodes.len() != 1 {
        reply_error(&session, id, AppError::BadRequest("exactly one opcode required".into()));
        return;
    }
    let opcode = opcodes[0];

    if opcode == "hi" {
        if session.hi_seen().await {
            reply_error(&session, id, AppError::BadRequest("hi already sent".into()));
            return;
        }
    } else if !STATEFUL_OPCODES_EXEMPT_FROM_ID.contains(&opcode) && id.as_deref().unwrap_or("").is_empty() {
        reply_error(&session, id, AppError::BadRequest("id required".into()));
        return;
    }

    if !opcode_is_exempt_from_auth(opcode, &frame) && session.user_id().await.is_none() {
        reply_error(&session, id, AppError::Unauthorized);
        return;
    }

    let result = tokio::time::timeout(
        state.config.handler_timeout,
        route(&session, state, id.clone(), opcode, frame),
    )
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => reply_error(&session, id, e),
        Err(_) => {
            error!(opcode, "handler timed out");
            reply_error(&session, id, AppError::Internal);
        }
    }
}

fn opcode_is_exempt_from_auth(opcode: &str, frame: &ClientFrame) -> bool {
    match opcode {
        "hi" | "login" => true,
        "acc" => frame.acc.as_ref().is_some_and(|a| a.user == "new"),
        _ => false,
    }
}

async fn route(
    session: &Arc<Session>,
    state: &AppState,
    id: Option<String>,
    opcode: &str,
    frame: ClientFrame,
) -> Result<(), AppError> {
    match opcode {
        "hi" => handlers::hi::handle(session, id, frame.hi.unwrap()).await,
        "login" => handlers::login::handle(session, state, id, frame.login.unwrap()).await,
        "acc" => handlers::acc::handle(session, state, id, frame.acc.unwrap()).await,
        "search" => handlers::search::handle(session, state, id, frame.search.unwrap()).await,
        "dm" => handlers::dm::handle(session, state, id, frame.dm.unwrap()).await,
        "room" => handlers::room::handle(session, state, id, frame.room.unwrap()).await,
        "send" => handlers::send::handle(session, state, id, frame.send.unwrap()).await,
        "get" => handlers::get::handle(session, state, id, frame.get.unwrap()).await,
        "edit" => handlers::edit::handle(session, state, id, frame.edit.unwrap()).await,
        "unsend" => handlers::unsend::handle(session, state, id, frame.unsend.unwrap()).await,
        "delete" => handlers::delete::handle(session, state, id, frame.delete.unwrap()).await,
        "react" => handlers::react::handle(session, state, id, frame.react.unwrap()).await,
        "typing" => handlers::typing::handle(session, state, frame.typing.unwrap()).await,
        "read" => handlers::receipts::handle_read(session, state, id, frame.read.unwrap()).await,
        "recv" => handlers::receipts::handle_recv(session, state, id, frame.recv.unwrap()).await,
        "clear" => handlers::clear::handle(session, state, id, frame.clear.unwrap()).await,
        "invite" => handlers::invite::handle(session, state, id, frame.invite.unwrap()).await,
        "contact" => handlers::contact::handle(session, state, id, frame.contact.unwrap()).await,
        "pin" => handlers::pin::handle(session, state, id, frame.pin.unwrap()).await,
        _ => Err(AppError::BadRequest("unknown opcode".into())),
    }
}

fn reply_error(session: &Arc<Session>, id: Option<String>, err: AppError) {
    let mut ctrl = Ctrl::new(id, err.code());
    if let Some(text) = err.text() {
        ctrl = ctrl.with_text(text);
    }
    session.send(ServerFrame::ctrl(ctrl));
}
