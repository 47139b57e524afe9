//! Process-wide registry of live sessions (spec.md §4.2). A single lock
//! guards the three mappings from §3; register/unregister arrive on
//! non-blocking bounded channels and are applied by one dedicated task so
//! callers (session reader/writer teardown paths) never stall on the lock.

use std::collections::HashMap;
use std::sync::Arc;

use chat_protocol::ServerFrame;
use futures_util::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::presence::Presence;
use crate::pubsub::{Envelope, PubSub};
use crate::session::Session;

const EVENT_QUEUE_DEPTH: usize = 1024;

enum HubEvent {
    Register(Arc<Session>),
    Unregister(Uuid),
    Authenticate { session_id: Uuid, user_id: Uuid },
}

#[derive(Default)]
struct Maps {
    by_session: HashMap<Uuid, Arc<Session>>,
    by_user: HashMap<Uuid, Vec<Arc<Session>>>,
}

pub struct Hub {
    maps: RwLock<Maps>,
    event_tx: mpsc::Sender<HubEvent>,
    pubsub: Arc<dyn PubSub>,
    presence: std::sync::OnceLock<Arc<Presence>>,
}

impl Hub {
    pub fn new(pubsub: Arc<dyn PubSub>) -> Arc<Self> {
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let hub = Arc::new(Self {
            maps: RwLock::new(Maps::default()),
            event_tx,
            pubsub,
            presence: std::sync::OnceLock::new(),
        });

        let worker_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                worker_hub.apply(event).await;
            }
        });

        hub
    }

    /// Presence has a back-reference into the Hub it dispatches through; it
    /// is constructed after the Hub and wired in once via this setter.
    pub fn set_presence(&self, presence: Arc<Presence>) {
        let _ = self.presence.set(presence);
    }

    fn presence(&self) -> &Arc<Presence> {
        self.presence.get().expect("presence wired before use")
    }

    async fn apply(&self, event: HubEvent) {
        match event {
            HubEvent::Register(session) => {
                self.maps.write().await.by_session.insert(session.id, session);
            }
            HubEvent::Unregister(session_id) => {
                let (user_id, went_empty) = {
                    let mut maps = self.maps.write().await;
                    let Some(session) = maps.by_session.remove(&session_id) else {
                        return;
                    };
                    let Some(user_id) = session.user_id().await else {
                        return;
                    };
                    let mut went_empty = false;
                    if let Some(list) = maps.by_user.get_mut(&user_id) {
                        list.retain(|s| s.id != session_id);
                        if list.is_empty() {
                            maps.by_user.remove(&user_id);
                            went_empty = true;
                        }
                    }
                    (user_id, went_empty)
                };
                if went_empty {
                    let presence = self.presence().clone();
                    tokio::spawn(async move { presence.user_offline(user_id).await });
                }
            }
            HubEvent::Authenticate { session_id, user_id } => {
                let became_online = {
                    let mut maps = self.maps.write().await;
                    let Some(session) = maps.by_session.get(&session_id).cloned() else {
                        return;
                    };
                    for list in maps.by_user.values_mut() {
                        list.retain(|s| s.id != session_id);
                    }
                    let list = maps.by_user.entry(user_id).or_default();
                    let became_online = list.is_empty();
                    list.push(session);
                    became_online
                };
                if became_online {
                    let presence = self.presence().clone();
                    tokio::spawn(async move { presence.user_online(user_id).await });
                }
            }
        }
    }

    pub async fn register(&self, session: Arc<Session>) {
        if self.event_tx.send(HubEvent::Register(session)).await.is_err() {
            warn!("hub event channel closed on register");
        }
    }

    pub async fn unregister(&self, session_id: Uuid) {
        if self
            .event_tx
            .send(HubEvent::Unregister(session_id))
            .await
            .is_err()
        {
            warn!("hub event channel closed on unregister");
        }
    }

    /// Atomic transition: detaches from any previous user, attaches to the
    /// new one, and (via the background apply task) triggers presence ONLINE
    /// iff this is the user's first session on this node.
    pub async fn authenticate_session(&self, session_id: Uuid, user_id: Uuid) {
        if self
            .event_tx
            .send(HubEvent::Authenticate { session_id, user_id })
            .await
            .is_err()
        {
            warn!("hub event channel closed on authenticate");
        }
    }

    /// Snapshots the user's local sessions under the read lock, releases it,
    /// then sends — never holds the hub lock while calling into Session.
    pub async fn send_to_user(&self, user: Uuid, frame: ServerFrame) {
        let sessions = {
            let maps = self.maps.read().await;
            maps.by_user.get(&user).cloned().unwrap_or_default()
        };
        for session in sessions {
            session.send(frame.clone());
        }
    }

    /// Fans `frame` out to every member in `users`, skipping `skip_session`
    /// (the sender's originating session; its other sessions still receive
    /// it, per multi-device sync). Users with no local session are
    /// delegated to Pub/Sub if online elsewhere.
    pub async fn send_to_users(&self, users: &[Uuid], frame: ServerFrame, skip_session: Option<Uuid>) {
        let mut remote_candidates = Vec::new();
        {
            let maps = self.maps.read().await;
            for &user in users {
                match maps.by_user.get(&user) {
                    Some(sessions) if !sessions.is_empty() => {
                        for session in sessions {
                            if Some(session.id) != skip_session {
                                session.send(frame.clone());
                            }
                        }
                    }
                    _ => remote_candidates.push(user),
                }
            }
        }
        for user in remote_candidates {
            if self.pubsub.is_online(user).await.unwrap_or(false) {
                let Ok(payload) = serde_json::to_vec(&frame) else {
                    continue;
                };
                let envelope = Envelope {
                    kind: "data".to_owned(),
                    origin_node: self.pubsub.node_id().to_owned(),
                    target_user: Some(user),
                    payload,
                };
                let _ = self.pubsub.publish_to_user(user, envelope).await;
            }
        }
    }

    pub async fn is_online(&self, user: Uuid) -> bool {
        self.maps
            .read()
            .await
            .by_user
            .get(&user)
            .is_some_and(|sessions| !sessions.is_empty())
    }

    pub async fn is_online_anywhere(&self, user: Uuid) -> bool {
        if self.is_online(user).await {
            return true;
        }
        self.pubsub.is_online(user).await.unwrap_or(false)
    }

    pub async fn session_count(&self) -> usize {
        self.maps.read().await.by_session.len()
    }

    pub async fn online_user_count(&self) -> usize {
        self.maps.read().await.by_user.len()
    }

    pub async fn local_online_users(&self) -> Vec<Uuid> {
        self.maps.read().await.by_user.keys().copied().collect()
    }

    /// Drains this node's Pub/Sub subscription and multiplexes foreign-origin
    /// envelopes into local Sessions (spec.md §2 "remote Hubs receive and
    /// multiplex to their local Sessions", §4.4, §6.3).
    pub fn spawn_remote_listener(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut stream = match self.pubsub.subscribe().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to subscribe to cross-node pub/sub");
                    return;
                }
            };
            while let Some(envelope) = stream.next().await {
                if envelope.origin_node == self.pubsub.node_id() {
                    continue; // same-origin, spec.md §9 "origin-filter for pub/sub loops"
                }
                let Some(user) = envelope.target_user else { continue };
                let Ok(frame) = serde_json::from_slice::<ServerFrame>(&envelope.payload) else {
                    continue;
                };
                self.send_to_user(user, frame).await;
            }
        });
    }
}
