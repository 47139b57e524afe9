//! S8 — presence transition (spec.md §8).

use chat_protocol::{ClientFrame, DmPayload, PresWhat};
use chat_test_utils::{register_user, spawn_server, TestClient};

#[tokio::test]
async fn conversational_partner_sees_online_then_offline_with_last_seen() {
    let url = spawn_server().await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    let user1 = register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;

    // u1 and u2 must already share a conversation for u2 to be a presence
    // subscriber of u1 (spec.md §4.3's subscriber set is conversation
    // membership). Creating the DM authenticates both, so u1 reconnects
    // below to re-trigger the online transition under test.
    u1.send(&ClientFrame {
        id: Some("dm".to_owned()),
        dm: Some(DmPayload {
            user: Some(user2),
            ..Default::default()
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    u1.recv().await.unwrap();

    u1.close().await.unwrap();
    // First session closing marks u1 offline; u2 observes that transition
    // before we bring u1 back online on a fresh connection.
    let pres = u2.recv_matching(|f| f.pres.is_some()).await.unwrap().pres.unwrap();
    assert_eq!(pres.user, user1);
    assert_eq!(pres.what, PresWhat::Off);
    let first_last_seen = pres.last_seen.unwrap();
    let skew = chrono::Utc::now() - first_last_seen;
    assert!(skew.num_seconds().abs() <= 2);

    let mut u1b = TestClient::connect(&url).await.unwrap();
    u1b.send(&ClientFrame {
        id: Some("login".to_owned()),
        login: Some(chat_protocol::LoginPayload {
            scheme: chat_protocol::LoginScheme::Basic,
            secret: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "alice:hunter2"),
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    u1b.recv().await.unwrap();

    let pres = u2.recv_matching(|f| f.pres.is_some()).await.unwrap().pres.unwrap();
    assert_eq!(pres.user, user1);
    assert_eq!(pres.what, PresWhat::On);
    assert!(pres.last_seen.is_none());

    u1b.close().await.unwrap();
    let pres = u2.recv_matching(|f| f.pres.is_some()).await.unwrap().pres.unwrap();
    assert_eq!(pres.user, user1);
    assert_eq!(pres.what, PresWhat::Off);
    assert!(pres.last_seen.is_some());
}
