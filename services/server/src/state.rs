//! Shared application state: the Hub, Store, Pub/Sub, Presence, Config, and
//! content codec a handler needs, bundled behind cheap `Arc` clones so every
//! axum handler and every session task can carry its own copy.

use std::sync::Arc;

use chat_codec::ContentCodec;

use crate::config::Config;
use crate::hub::Hub;
use crate::presence::Presence;
use crate::pubsub::PubSub;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub store: Arc<dyn Store>,
    pub pubsub: Arc<dyn PubSub>,
    pub presence: Arc<Presence>,
    pub config: Arc<Config>,
    pub codec: ContentCodec,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        pubsub: Arc<dyn PubSub>,
        config: Config,
    ) -> Self {
        let config = Arc::new(config);
        let hub = Hub::new(pubsub.clone());
        let presence = Presence::new(hub.clone(), pubsub.clone(), store.clone(), config.presence_ttl);
        hub.set_presence(presence.clone());
        let codec = ContentCodec::new(&config.content_codec_key);
        Self {
            hub,
            store,
            pubsub,
            presence,
            config,
            codec,
        }
    }
}
