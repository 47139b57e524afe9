//! Cross-node backend: presence lives in Redis keys with a TTL, fan-out
//! rides Redis Pub/Sub channels. Gated behind the `redis-pubsub` feature so
//! a single-node deployment never needs a Redis dependency at runtime.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use redis::AsyncCommands;
use uuid::Uuid;

use super::{Envelope, PubSub, PubSubError, PubSubResult};

fn presence_key(user: Uuid) -> String {
    format!("chat:online:{user}")
}

fn user_channel(user: Uuid) -> String {
    format!("chat:user:{user}")
}

const USER_CHANNEL_PATTERN: &str = "chat:user:*";

pub struct RedisPubSub {
    node_id: String,
    client: redis::Client,
}

impl RedisPubSub {
    pub fn new(addr: &str) -> PubSubResult<Self> {
        let client = redis::Client::open(addr).map_err(|e| PubSubError::Backend(e.to_string()))?;
        Ok(Self {
            node_id: Uuid::new_v4().to_string(),
            client,
        })
    }

    async fn conn(&self) -> PubSubResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }
}

#[async_trait]
impl PubSub for RedisPubSub {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn set_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(presence_key(user), &self.node_id, ttl.as_secs().max(1))
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }

    async fn set_offline(&self, user: Uuid) -> PubSubResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(presence_key(user))
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }

    async fn is_online(&self, user: Uuid) -> PubSubResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists(presence_key(user))
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }

    async fn refresh_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()> {
        let mut conn = self.conn().await?;
        conn.expire::<_, ()>(presence_key(user), ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }

    async fn publish(&self, channel: &str, envelope: Envelope) -> PubSubResult<()> {
        let mut conn = self.conn().await?;
        let payload = encode(&envelope);
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))
    }

    async fn publish_to_user(&self, user: Uuid, envelope: Envelope) -> PubSubResult<()> {
        self.publish(&user_channel(user), envelope).await
    }

    async fn subscribe(&self) -> PubSubResult<BoxStream<'static, Envelope>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))?;
        pubsub
            .psubscribe(USER_CHANNEL_PATTERN)
            .await
            .map_err(|e| PubSubError::Backend(e.to_string()))?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { decode(msg.get_payload_bytes()) });
        Ok(Box::pin(stream))
    }
}

fn encode(envelope: &Envelope) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(envelope.kind.as_bytes());
    out.push(0);
    out.extend_from_slice(envelope.origin_node.as_bytes());
    out.push(0);
    if let Some(user) = envelope.target_user {
        out.extend_from_slice(user.to_string().as_bytes());
    }
    out.push(0);
    out.extend_from_slice(&envelope.payload);
    out
}

fn decode(bytes: &[u8]) -> Option<Envelope> {
    let mut parts = bytes.splitn(4, |&b| b == 0);
    let kind = String::from_utf8(parts.next()?.to_vec()).ok()?;
    let origin_node = String::from_utf8(parts.next()?.to_vec()).ok()?;
    let target_user_raw = parts.next()?;
    let target_user = if target_user_raw.is_empty() {
        None
    } else {
        Uuid::parse_str(&String::from_utf8(target_user_raw.to_vec()).ok()?).ok()
    };
    let payload = parts.next()?.to_vec();
    Some(Envelope {
        kind,
        origin_node,
        target_user,
        payload,
    })
}
