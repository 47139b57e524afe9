//! S2 — edit window, S3 — unsend by non-sender (spec.md §8).

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, EditPayload, SendPayload, SeqRefPayload};
use chat_test_utils::{register_user, spawn_server_with_config, test_config, TestClient};
use uuid::Uuid;

async fn start_dm(u1: &mut TestClient, other: Uuid) -> Uuid {
    u1.send(&ClientFrame {
        id: Some("dm".to_owned()),
        dm: Some(DmPayload {
            user: Some(other),
            ..Default::default()
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let reply = u1.recv().await.unwrap();
    Uuid::parse_str(reply.ctrl.unwrap().params.unwrap()["conv"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn edit_within_window_succeeds_and_after_window_is_forbidden() {
    let mut config = test_config();
    config.edit_window = chrono::Duration::milliseconds(150);
    let url = spawn_server_with_config(config).await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;
    let conv = start_dm(&mut u1, user2).await;

    u1.send(&ClientFrame {
        id: Some("send".to_owned()),
        send: Some(SendPayload {
            conv,
            content: "enc(hi)".to_owned(),
            reply_to: None,
            view_once: None,
            view_once_ttl: None,
            mentions: None,
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    u1.recv().await.unwrap();

    u1.send(&ClientFrame {
        id: Some("edit1".to_owned()),
        edit: Some(EditPayload { conv, seq: 1, content: "enc(hi2)".to_owned() }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u1.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    u1.send(&ClientFrame {
        id: Some("edit2".to_owned()),
        edit: Some(EditPayload { conv, seq: 1, content: "enc(hi3)".to_owned() }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u1.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Forbidden.as_u16());
}

#[tokio::test]
async fn unsend_by_non_sender_is_forbidden() {
    let url = spawn_server_with_config(test_config()).await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;
    let conv = start_dm(&mut u1, user2).await;

    u1.send(&ClientFrame {
        id: Some("send".to_owned()),
        send: Some(SendPayload {
            conv,
            content: "enc(hi)".to_owned(),
            reply_to: None,
            view_once: None,
            view_once_ttl: None,
            mentions: None,
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    u1.recv().await.unwrap();
    u2.recv_matching(|f| f.data.is_some()).await.unwrap();

    u2.send(&ClientFrame {
        id: Some("unsend".to_owned()),
        unsend: Some(SeqRefPayload { conv, seq: 1 }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u2.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Forbidden.as_u16());
    assert_eq!(ctrl.text.as_deref(), Some("not the sender"));
}
