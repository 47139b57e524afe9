//! Spins up an in-process server (spec.md §6) backed by `InMemoryStore` so
//! integration tests can drive real WebSocket connections without touching
//! Postgres or Redis.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chat_protocol::{AccPayload, ClientFrame, CtrlCode};
use server::config::Config;
use server::pubsub::memory::InMemoryPubSub;
use server::pubsub::PubSub;
use server::state::AppState;
use server::store::memory::InMemoryStore;
use server::store::Store;
use uuid::Uuid;

use crate::TestClient;

/// A `Config` with generous windows/limits so tests aren't fighting the
/// rate limiter or edit/unsend windows unless they're specifically testing
/// those.
pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_owned(),
        database_url: String::new(),
        redis_addr: None,
        content_codec_key: [7u8; 32],
        auth_token_key: vec![9u8; 32],
        pong_wait: Duration::from_secs(60),
        ping_period: Duration::from_secs(25),
        max_frame_size: 64 * 1024,
        handler_timeout: Duration::from_secs(5),
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        edit_window: chrono::Duration::minutes(15),
        edit_max: 10,
        unsend_window: chrono::Duration::minutes(60),
        presence_ttl: Duration::from_secs(300),
    }
}

/// Spawns an in-process server on a random port and returns its WebSocket
/// base URL.
pub async fn spawn_server() -> String {
    spawn_server_with_config(test_config()).await
}

pub async fn spawn_server_with_config(config: Config) -> String {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let pubsub: Arc<dyn PubSub> = Arc::new(InMemoryPubSub::new());
    let state = AppState::new(store, pubsub, config);
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("ws://{addr}/ws/v1/chat")
}

/// Registers a brand new account over `client` and returns its user id.
/// Asserts the `acc` reply is a 200 with a `userId` param.
pub async fn register_user(client: &mut TestClient, username: &str, password: &str) -> Uuid {
    let secret = base64::engine::general_purpose::STANDARD.encode(password);
    client
        .send(&ClientFrame {
            id: Some("register".to_owned()),
            acc: Some(AccPayload {
                user: "new".to_owned(),
                scheme: None,
                secret: Some(secret),
                login: Some(username.to_owned()),
                desc: None,
                invite_code: None,
                email: None,
                lang: None,
                current_secret: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let frame = client.recv().await.unwrap();
    let ctrl = frame.ctrl.expect("acc reply is a ctrl frame");
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16(), "registration failed: {:?}", ctrl.text);
    let params = ctrl.params.expect("acc reply carries params");
    Uuid::parse_str(params["userId"].as_str().unwrap()).unwrap()
}
