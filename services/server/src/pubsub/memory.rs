//! Single-node default: presence is just a local TTL map, and "publish" has
//! no remote peers to reach. Every envelope published here is necessarily
//! same-origin, so cross-node fan-out is a no-op — correct for one node,
//! not for a cluster (use the `redis-pubsub` feature for that).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use uuid::Uuid;

use super::{Envelope, PubSub, PubSubResult};

pub struct InMemoryPubSub {
    node_id: String,
    online: Mutex<HashMap<Uuid, Instant>>,
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self {
            node_id: Uuid::new_v4().to_string(),
            online: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn set_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()> {
        self.online.lock().unwrap().insert(user, Instant::now() + ttl);
        Ok(())
    }

    async fn set_offline(&self, user: Uuid) -> PubSubResult<()> {
        self.online.lock().unwrap().remove(&user);
        Ok(())
    }

    async fn is_online(&self, user: Uuid) -> PubSubResult<bool> {
        Ok(self
            .online
            .lock()
            .unwrap()
            .get(&user)
            .is_some_and(|expiry| *expiry > Instant::now()))
    }

    async fn refresh_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()> {
        if let Some(expiry) = self.online.lock().unwrap().get_mut(&user) {
            *expiry = Instant::now() + ttl;
        }
        Ok(())
    }

    async fn publish(&self, _channel: &str, _envelope: Envelope) -> PubSubResult<()> {
        Ok(())
    }

    async fn publish_to_user(&self, _user: Uuid, _envelope: Envelope) -> PubSubResult<()> {
        Ok(())
    }

    async fn subscribe(&self) -> PubSubResult<BoxStream<'static, Envelope>> {
        // Single-node: there are no remote peers to receive from, so this is
        // a stream that never yields (same reasoning as `publish` above).
        Ok(Box::pin(futures_util::stream::empty()))
    }
}
