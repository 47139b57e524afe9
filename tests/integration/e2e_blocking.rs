//! S4 — blocking in a DM (spec.md §8).

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, SendPayload};
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

fn send_frame(conv: Uuid, id: &str) -> ClientFrame {
    ClientFrame {
        id: Some(id.to_owned()),
        send: Some(SendPayload {
            conv,
            content: "enc(hi)".to_owned(),
            reply_to: None,
            view_once: None,
            view_once_ttl: None,
            mentions: None,
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn blocked_sender_is_forbidden_but_blocker_can_still_send() {
    let url = spawn_server().await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;
    let conv = start_dm(&mut u1, user2).await;

    u2.send(&ClientFrame {
        id: Some("block".to_owned()),
        dm: Some(DmPayload {
            conv: Some(conv),
            blocked: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u2.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());

    u1.send(&send_frame(conv, "send1")).await.unwrap();
    let ctrl = u1.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Forbidden.as_u16());
    assert_eq!(ctrl.text.as_deref(), Some("blocked"));

    u2.send(&send_frame(conv, "send2")).await.unwrap();
    let ctrl = u2.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Accepted.as_u16());
}
