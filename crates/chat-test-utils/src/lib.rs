//! Shared test client for chat-hub end-to-end integration tests.

pub mod harness;
pub mod test_client;

pub use harness::{register_user, spawn_server, spawn_server_with_config, test_config};
pub use test_client::TestClient;
