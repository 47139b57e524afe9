//! S1 — DM create and send (spec.md §8).

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, SendPayload};
use chat_test_utils::{register_user, spawn_server, TestClient};
use uuid::Uuid;

#[tokio::test]
async fn dm_create_then_send_fans_out_to_the_other_user() {
    let url = spawn_server().await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    let user1 = register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;

    u1.send(&ClientFrame {
        id: Some("1".to_owned()),
        dm: Some(DmPayload {
            user: Some(user2),
            ..Default::default()
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let reply = u1.recv().await.unwrap();
    let ctrl = reply.ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Created.as_u16());
    let params = ctrl.params.unwrap();
    assert_eq!(params["created"], true);
    let conv = Uuid::parse_str(params["conv"].as_str().unwrap()).unwrap();

    u1.send(&ClientFrame {
        id: Some("2".to_owned()),
        send: Some(SendPayload {
            conv,
            content: "encrypted(hi)".to_owned(),
            reply_to: None,
            view_once: None,
            view_once_ttl: None,
            mentions: None,
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let reply = u1.recv().await.unwrap();
    let ctrl = reply.ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Accepted.as_u16());
    assert_eq!(ctrl.params.unwrap()["seq"], 1);

    let data_frame = u2.recv_matching(|f| f.data.is_some()).await.unwrap();
    let data = data_frame.data.unwrap();
    assert_eq!(data.conv, conv);
    assert_eq!(data.seq, 1);
    assert_eq!(data.from, user1);
    // Content is codec-sealed at rest and on the wire; the core never
    // round-trips plaintext.
    assert_ne!(data.content, "hi");
    assert!(!data.content.is_empty());
}
