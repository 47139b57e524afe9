use std::sync::Arc;

use server::config::Config;
use server::db;
use server::pubsub::memory::InMemoryPubSub;
use server::pubsub::PubSub;
use server::state::AppState;
use server::store::postgres::PostgresStore;
use server::store::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = Config::from_env();

    info!("connecting to database...");
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));
    let pubsub: Arc<dyn PubSub> = match &config.redis_addr {
        #[cfg(feature = "redis-pubsub")]
        Some(addr) => Arc::new(
            server::pubsub::redis::RedisPubSub::new(addr).expect("failed to connect to redis"),
        ),
        #[cfg(not(feature = "redis-pubsub"))]
        Some(_) => panic!("REDIS_ADDR set but the redis-pubsub feature is not enabled"),
        None => Arc::new(InMemoryPubSub::new()),
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(store, pubsub, config);
    state.hub.clone().spawn_remote_listener();
    state.presence.clone().spawn_heartbeat();
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
