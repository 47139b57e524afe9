//! Testable Properties 8 & 9 (spec.md §8): single-opcode and auth-gate.

use chat_protocol::{ClientFrame, ConvRefPayload, CtrlCode, GetPayload, SeqRefPayload};
use chat_test_utils::spawn_server;
use chat_test_utils::TestClient;
use uuid::Uuid;

#[tokio::test]
async fn two_opcodes_in_one_frame_is_bad_request() {
    let url = spawn_server().await;
    let mut client = TestClient::connect(&url).await.unwrap();

    client
        .send(&ClientFrame {
            id: Some("1".to_owned()),
            typing: Some(ConvRefPayload { conv: Uuid::nil() }),
            read: Some(SeqRefPayload { conv: Uuid::nil(), seq: 1 }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = client.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::BadRequest.as_u16());
}

#[tokio::test]
async fn unauthenticated_session_gets_401_for_any_opcode_except_hi_login_acc_new() {
    let url = spawn_server().await;
    let mut client = TestClient::connect(&url).await.unwrap();

    client
        .send(&ClientFrame {
            id: Some("1".to_owned()),
            get: Some(GetPayload {
                what: "contacts".to_owned(),
                conv: None,
                user: None,
                before: None,
                limit: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = client.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Unauthorized.as_u16());
}

#[tokio::test]
async fn hi_twice_is_bad_request() {
    let url = spawn_server().await;
    let mut client = TestClient::connect(&url).await.unwrap();

    let hi = chat_protocol::HiPayload { ver: "1".to_owned(), ua: None, dev: None, lang: None };
    client
        .send(&ClientFrame { hi: Some(hi.clone()), ..Default::default() })
        .await
        .unwrap();
    let ctrl = client.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());

    client
        .send(&ClientFrame { hi: Some(hi), ..Default::default() })
        .await
        .unwrap();
    let ctrl = client.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::BadRequest.as_u16());
    assert_eq!(ctrl.text.as_deref(), Some("hi already sent"));
}
