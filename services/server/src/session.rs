//! One client connection (spec.md §4.1). A reader task decodes and dispatches
//! inbound frames; a writer task owns the socket for writes and multiplexes
//! the outbound queue with the ping ticker. The two tasks never touch the
//! socket from anywhere else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use chat_protocol::{ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

const OUTBOUND_QUEUE_DEPTH: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub ver: String,
    pub ua: Option<String>,
    pub dev: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default)]
struct AuthState {
    user_id: Option<Uuid>,
    descriptors: Descriptors,
    hi_seen: bool,
}

/// Token-bucket rate limiter: R tokens/s, burst B (spec.md §4.1).
struct RateLimiter {
    tokens: f64,
    rate: f64,
    burst: f64,
    last: Instant,
}

impl RateLimiter {
    fn new(rate: f64, burst: f64) -> Self {
        Self {
            tokens: burst,
            rate,
            burst,
            last: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct Session {
    pub id: Uuid,
    out_tx: mpsc::Sender<ServerFrame>,
    auth: RwLock<AuthState>,
    closing: AtomicBool,
    close_notify: Notify,
    rate_limiter: std::sync::Mutex<RateLimiter>,
}

impl Session {
    fn new(rate_rps: u32, rate_burst: u32) -> (Arc<Self>, mpsc::Receiver<ServerFrame>) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            out_tx,
            auth: RwLock::new(AuthState::default()),
            closing: AtomicBool::new(false),
            close_notify: Notify::new(),
            rate_limiter: std::sync::Mutex::new(RateLimiter::new(
                f64::from(rate_rps),
                f64::from(rate_burst),
            )),
        });
        (session, out_rx)
    }

    /// Non-blocking enqueue. Drops silently if closing; classifies the
    /// session as a slow consumer and initiates close if the queue is full.
    pub fn send(self: &Arc<Self>, frame: ServerFrame) {
        if self.closing.load(Ordering::Acquire) {
            return;
        }
        match self.out_tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let session = self.clone();
                tokio::spawn(async move {
                    let user_id = session.user_id().await;
                    warn!(session_id = %session.id, ?user_id, "slow_consumer_disconnect");
                    session.close();
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            self.close_notify.notify_waiters();
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub async fn user_id(&self) -> Option<Uuid> {
        self.auth.read().await.user_id
    }

    pub async fn descriptors(&self) -> Descriptors {
        self.auth.read().await.descriptors.clone()
    }

    pub async fn hi_seen(&self) -> bool {
        self.auth.read().await.hi_seen
    }

    pub async fn set_hi(&self, descriptors: Descriptors) {
        let mut auth = self.auth.write().await;
        auth.descriptors = descriptors;
        auth.hi_seen = true;
    }

    pub async fn set_user_id(&self, user_id: Uuid) {
        self.auth.write().await.user_id = Some(user_id);
        info!(session_id = %self.id, %user_id, "authenticated");
    }

    pub fn try_consume_rate_token(&self) -> bool {
        self.rate_limiter.lock().unwrap().try_acquire()
    }
}

/// Accepts an upgraded socket, registers the session with the hub, and runs
/// its reader/writer tasks to completion.
pub async fn run(socket: WebSocket, state: AppState) {
    let (session, out_rx) = Session::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    );
    state.hub.register(session.clone()).await;
    info!(session_id = %session.id, "connected");

    let (mut sink, mut stream) = socket.split();

    let writer_session = session.clone();
    let ping_period = state.config.ping_period;
    let writer = tokio::spawn(async move {
        let mut out_rx = out_rx;
        let mut ticker = tokio::time::interval(ping_period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = writer_session.close_notify.notified() => break,
                frame = out_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let Ok(json) = serde_json::to_string(&frame) else { continue };
                            if sink.send(WsMessage::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        writer_session.close();
        let _ = sink.close().await;
    });

    let reader_session = session.clone();
    let reader_state = state.clone();
    let pong_wait = state.config.pong_wait;
    let max_frame_size = state.config.max_frame_size;
    let reader = tokio::spawn(async move {
        loop {
            let recv = tokio::time::timeout(pong_wait, stream.next());
            let msg = tokio::select! {
                _ = reader_session.close_notify.notified() => break,
                msg = recv => msg,
            };
            let msg = match msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => {
                    warn!(session_id = %reader_session.id, error = %e, "read_error");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(session_id = %reader_session.id, "read_error: pong_wait elapsed");
                    break;
                }
            };
            match msg {
                WsMessage::Text(text) => {
                    if text.len() > max_frame_size {
                        continue;
                    }
                    handle_inbound(&reader_session, &text, &reader_state).await;
                }
                WsMessage::Close(_) => break,
                WsMessage::Pong(_) | WsMessage::Ping(_) | WsMessage::Binary(_) => {}
            }
        }
        reader_session.close();
    });

    let _ = tokio::join!(writer, reader);
    state.hub.unregister(session.id).await;
    let user_id = session.user_id().await;
    info!(session_id = %session.id, ?user_id, "closed");
}

async fn handle_inbound(session: &Arc<Session>, text: &str, state: &AppState) {
    if !session.try_consume_rate_token() {
        let id = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.get("id").and_then(|i| i.as_str()).map(ToOwned::to_owned));
        session.send(ServerFrame::ctrl(
            chat_protocol::Ctrl::new(id, chat_protocol::CtrlCode::TooManyRequests)
                .with_text("too many requests"),
        ));
        return;
    }

    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            let id = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("id").and_then(|i| i.as_str()).map(ToOwned::to_owned));
            session.send(ServerFrame::ctrl(
                chat_protocol::Ctrl::new(id, chat_protocol::CtrlCode::BadRequest)
                    .with_text("malformed frame"),
            ));
            return;
        }
    };

    crate::dispatcher::dispatch(session.clone(), frame, state).await;
}
