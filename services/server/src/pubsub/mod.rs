//! Cross-node publish/subscribe + presence-cache collaborator (spec.md §4.4,
//! §6.3). The core depends on this trait only; `memory` is the default
//! single-node implementation, `redis` (behind the `redis-pubsub` feature)
//! is the cross-node one.

pub mod memory;
#[cfg(feature = "redis-pubsub")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use uuid::Uuid;

pub use memory::InMemoryPubSub;

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("backend error: {0}")]
    Backend(String),
}

pub type PubSubResult<T> = Result<T, PubSubError>;

#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: String,
    pub origin_node: String,
    /// The user this envelope is addressed to, carried through so a
    /// subscriber can hand it to `Hub::send_to_user` without needing the
    /// channel name it arrived on.
    pub target_user: Option<Uuid>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait PubSub: Send + Sync {
    /// This node's id, stamped on every outgoing envelope so subscribers can
    /// filter their own origin (spec.md §9 "Origin-filter for pub/sub loops").
    fn node_id(&self) -> &str;

    async fn set_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()>;
    async fn set_offline(&self, user: Uuid) -> PubSubResult<()>;
    async fn is_online(&self, user: Uuid) -> PubSubResult<bool>;
    async fn refresh_online(&self, user: Uuid, ttl: Duration) -> PubSubResult<()>;

    async fn publish(&self, channel: &str, envelope: Envelope) -> PubSubResult<()>;
    async fn publish_to_user(&self, user: Uuid, envelope: Envelope) -> PubSubResult<()>;

    /// Subscribes to every channel this node needs to multiplex into its
    /// local Sessions and returns the resulting envelope stream (spec.md
    /// §2 "remote Hubs receive and multiplex to their local Sessions",
    /// §4.4, §6.3). Same-origin filtering is the caller's job, not the
    /// stream's — the origin node id rides along on every `Envelope`.
    async fn subscribe(&self) -> PubSubResult<BoxStream<'static, Envelope>>;
}
