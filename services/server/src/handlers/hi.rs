use std::sync::Arc;

use chat_protocol::{Ctrl, CtrlCode, HiPayload, ServerFrame};

use crate::error::AppError;
use crate::session::{Descriptors, Session};

pub async fn handle(session: &Arc<Session>, id: Option<String>, payload: HiPayload) -> Result<(), AppError> {
    session
        .set_hi(Descriptors {
            ver: payload.ver,
            ua: payload.ua,
            dev: payload.dev,
            lang: payload.lang,
        })
        .await;

    session.send(ServerFrame::ctrl(
        Ctrl::new(id, CtrlCode::Ok).with_params(serde_json::json!({
            "ver": env!("CARGO_PKG_VERSION"),
            "sessionId": session.id,
        })),
    ));
    Ok(())
}
