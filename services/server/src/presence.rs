//! Translates local online transitions into cluster-visible state and
//! user-visible notifications (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use chat_protocol::{Pres, PresWhat, ServerFrame};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::hub::Hub;
use crate::pubsub::PubSub;
use crate::store::Store;

pub struct Presence {
    hub: Arc<Hub>,
    pubsub: Arc<dyn PubSub>,
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl Presence {
    pub fn new(hub: Arc<Hub>, pubsub: Arc<dyn PubSub>, store: Arc<dyn Store>, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            hub,
            pubsub,
            store,
            ttl,
        })
    }

    async fn subscriber_set(&self, user: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let Ok(conversations) = self.store.get_user_conversations(user, None, 1024).await else {
            return out;
        };
        for (conv, _) in conversations {
            let Ok(members) = self.store.get_conversation_members(conv.id).await else {
                continue;
            };
            for member in members {
                if member.user_id != user && !out.contains(&member.user_id) {
                    out.push(member.user_id);
                }
            }
        }
        out
    }

    pub async fn user_online(&self, user: Uuid) {
        if let Err(e) = self.pubsub.set_online(user, self.ttl).await {
            warn!(%user, error = %e, "presence set_online failed");
        }
        let subscribers = self.subscriber_set(user).await;
        let frame = ServerFrame::pres(Pres {
            user,
            what: PresWhat::On,
            last_seen: None,
        });
        for subscriber in subscribers {
            self.hub.send_to_user(subscriber, frame.clone()).await;
        }
    }

    pub async fn user_offline(&self, user: Uuid) {
        if let Err(e) = self.pubsub.set_offline(user).await {
            warn!(%user, error = %e, "presence set_offline failed");
        }
        let now = Utc::now();
        if let Err(e) = self.store.set_last_seen(user, now).await {
            warn!(%user, error = %e, "failed to persist last_seen");
        }
        let subscribers = self.subscriber_set(user).await;
        let frame = ServerFrame::pres(Pres {
            user,
            what: PresWhat::Off,
            last_seen: Some(now),
        });
        for subscriber in subscribers {
            self.hub.send_to_user(subscriber, frame.clone()).await;
        }
    }

    /// Emits a presence frame for each requested user reflecting
    /// `IsOnlineAnywhere` and stored last-seen (spec.md §4.3 "Presence probe").
    pub async fn probe(&self, users: &[Uuid]) -> Vec<ServerFrame> {
        let mut out = Vec::with_capacity(users.len());
        for &user in users {
            let online = self.hub.is_online_anywhere(user).await;
            let last_seen = if online {
                None
            } else {
                self.store.get_last_seen(user).await.ok().flatten()
            };
            out.push(ServerFrame::pres(Pres {
                user,
                what: if online { PresWhat::On } else { PresWhat::Off },
                last_seen,
            }));
        }
        out
    }

    /// Every T = TTL/2..TTL/3 seconds, refresh the TTL for locally online
    /// users so a live node keeps its users marked online cluster-wide.
    pub fn spawn_heartbeat(self: Arc<Self>) {
        let period = self.ttl / 3;
        let hub = self.hub.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
            loop {
                ticker.tick().await;
                for user in hub.local_online_users().await {
                    if let Err(e) = self.pubsub.refresh_online(user, self.ttl).await {
                        warn!(%user, error = %e, "presence heartbeat refresh failed");
                    }
                }
            }
        });
    }
}
