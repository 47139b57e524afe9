//! S6 — reaction toggle (spec.md §8).

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, InfoWhat, ReactPayload, SendPayload};
use chat_test_utils::{register_user, spawn_server, TestClient};
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
async fn reacting_twice_toggles_off() {
    let url = spawn_server().await;

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
        id: Some("react1".to_owned()),
        react: Some(ReactPayload { conv, seq: 1, emoji: "👍".to_owned() }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u2.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());
    assert_eq!(ctrl.params.unwrap()["added"], true);

    let info = u1.recv_matching(|f| f.info.is_some()).await.unwrap().info.unwrap();
    assert_eq!(info.what, InfoWhat::React);
    assert_eq!(info.emoji.as_deref(), Some("👍"));

    u2.send(&ClientFrame {
        id: Some("react2".to_owned()),
        react: Some(ReactPayload { conv, seq: 1, emoji: "👍".to_owned() }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u2.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());
    assert_eq!(ctrl.params.unwrap()["added"], false);

    let info = u1.recv_matching(|f| f.info.is_some()).await.unwrap().info.unwrap();
    assert_eq!(info.what, InfoWhat::React);
}
