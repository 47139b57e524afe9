//! Maps failures onto the client-visible `ctrl.code` vocabulary (spec.md §7).
//! Every handler returns `Result<T, AppError>`; the dispatcher turns the
//! `Err` arm into a `ctrl` frame and never propagates the underlying cause
//! to the client.

use chat_protocol::CtrlCode;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("too many requests")]
    TooManyRequests,
    #[error("internal error")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> CtrlCode {
        match self {
            AppError::BadRequest(_) => CtrlCode::BadRequest,
            AppError::Unauthorized => CtrlCode::Unauthorized,
            AppError::Forbidden(_) => CtrlCode::Forbidden,
            AppError::NotFound => CtrlCode::NotFound,
            AppError::Conflict(_) => CtrlCode::Conflict,
            AppError::TooManyRequests => CtrlCode::TooManyRequests,
            AppError::Internal => CtrlCode::InternalError,
        }
    }

    /// Static text safe to show a client. Never the underlying cause.
    pub fn text(&self) -> Option<String> {
        match self {
            AppError::BadRequest(m) | AppError::Forbidden(m) | AppError::Conflict(m) => {
                Some(m.clone())
            }
            AppError::Internal => Some("internal error".to_owned()),
            _ => None,
        }
    }
}

/// Default `StoreError` → `AppError` mapping, called explicitly at each
/// Store call site instead of riding an automatic `From`/`?` coercion —
/// handlers that need a different mapping for a particular call (e.g.
/// `acc::create` turning a `Conflict` into a specific message) match on the
/// `StoreError` themselves before falling back to this for the rest.
pub(crate) fn map_store_err(e: crate::store::StoreError) -> AppError {
    match e {
        crate::store::StoreError::NotFound => AppError::NotFound,
        crate::store::StoreError::Conflict(msg) => AppError::Conflict(msg),
        crate::store::StoreError::Backend(_) => AppError::Internal,
    }
}
