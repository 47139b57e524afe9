pub mod auth;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod presence;
pub mod pubsub;
pub mod session;
pub mod state;
pub mod store;

pub use state::AppState;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/v1/chat", get(ws_upgrade_handler))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/v0/verify-email", get(verify_email))
        .fallback(fallback_404)
        .with_state(state)
}

async fn ws_upgrade_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state))
}

#[derive(Deserialize)]
struct VerifyEmailQuery {
    token: String,
}

async fn verify_email(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<VerifyEmailQuery>,
) -> impl IntoResponse {
    use axum::http::StatusCode;
    match state.store.verify_email_token(&query.token).await {
        Ok(true) => (StatusCode::OK, "email verified").into_response(),
        Ok(false) => (StatusCode::BAD_REQUEST, "invalid or expired token").into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

mod health {
    use axum::extract::State;
    use axum::response::IntoResponse;

    use crate::state::AppState;

    pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
        let sessions = state.hub.session_count().await;
        let online = state.hub.online_user_count().await;
        serde_json::json!({"status": "ok", "sessions": sessions, "onlineUsers": online}).to_string()
    }

    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}

async fn fallback_404() -> impl IntoResponse {
    use axum::http::StatusCode;
    (
        StatusCode::NOT_FOUND,
        Html(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>404 – Not Found</title>
  <style>
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
      background: #0f1117;
      color: #e1e4e8;
      display: flex;
      align-items: center;
      justify-content: center;
      min-height: 100vh;
    }
    .container { text-align: center; }
    .code {
      font-size: 8rem;
      font-weight: 700;
      letter-spacing: -0.04em;
      line-height: 1;
      background: linear-gradient(135deg, #667eea, #764ba2);
      -webkit-background-clip: text;
      -webkit-text-fill-color: transparent;
    }
    .message {
      margin-top: 0.5rem;
      font-size: 1.25rem;
      color: #8b949e;
    }
  </style>
</head>
<body>
  <div class="container">
    <div class="code">404</div>
    <p class="message">This page doesn't exist.</p>
  </div>
</body>
</html>"#,
        ),
    )
}
