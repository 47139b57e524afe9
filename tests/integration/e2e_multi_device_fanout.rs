//! S5 — multi-device fan-out (spec.md §8).

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, LoginPayload, LoginScheme, SendPayload};
use chat_test_utils::{register_user, spawn_server, TestClient};
use uuid::Uuid;

#[tokio::test]
async fn second_device_receives_data_frame_for_a_send_from_the_first() {
    let url = spawn_server().await;

    let mut s1a = TestClient::connect(&url).await.unwrap();
    let user1 = register_user(&mut s1a, "alice", "hunter2").await;

    let mut u2 = TestClient::connect(&url).await.unwrap();
    let user2 = register_user(&mut u2, "bob", "hunter2").await;

    // Second device for u1: log in with basic auth to mint an independent
    // session (a fresh connection already carries its own token anyway).
    let mut s1b = TestClient::connect(&url).await.unwrap();
    s1b.send(&ClientFrame {
        id: Some("login".to_owned()),
        login: Some(LoginPayload {
            scheme: LoginScheme::Basic,
            secret: base64_encode("alice:hunter2"),
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = s1b.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());

    s1a.send(&ClientFrame {
        id: Some("dm".to_owned()),
        dm: Some(DmPayload {
            user: Some(user2),
            ..Default::default()
        }),
        ..Default::default()
    })
    .await
    .unwrap();
    let conv = Uuid::parse_str(
        s1a.recv().await.unwrap().ctrl.unwrap().params.unwrap()["conv"]
            .as_str()
            .unwrap(),
    )
    .unwrap();

    s1a.send(&ClientFrame {
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
    let ctrl = s1a.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Accepted.as_u16());
    assert_eq!(ctrl.params.unwrap()["seq"], 1);

    let data = s1b.recv_matching(|f| f.data.is_some()).await.unwrap().data.unwrap();
    assert_eq!(data.seq, 1);
    assert_eq!(data.from, user1);

    let data = u2.recv_matching(|f| f.data.is_some()).await.unwrap().data.unwrap();
    assert_eq!(data.seq, 1);
    assert_eq!(data.from, user1);
}

fn base64_encode(s: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(s)
}
