//! S7 — rate limit (spec.md §8). R=5, B=5: 11 frames in quick succession
//! yield 5 accepted then 429s until the bucket refills; the session is
//! never disconnected.

use chat_protocol::{ClientFrame, CtrlCode, DmPayload, SendPayload};
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
async fn exceeding_the_bucket_yields_429_without_disconnect() {
    let mut config = test_config();
    config.rate_limit_rps = 5;
    config.rate_limit_burst = 5;
    let url = spawn_server_with_config(config).await;

    let mut u1 = TestClient::connect(&url).await.unwrap();
    let mut u2 = TestClient::connect(&url).await.unwrap();
    register_user(&mut u1, "alice", "hunter2").await;
    let user2 = register_user(&mut u2, "bob", "hunter2").await;
    let conv = start_dm(&mut u1, user2).await;

    // Let the bucket refill to full burst before the timed burst below; the
    // `acc`/`dm` setup frames above already spent a couple of tokens.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let mut accepted = 0;
    let mut limited = 0;
    for i in 0..11 {
        u1.send(&ClientFrame {
            id: Some(format!("send{i}")),
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
        let ctrl = u1.recv().await.unwrap().ctrl.unwrap();
        if ctrl.code == CtrlCode::Accepted.as_u16() {
            accepted += 1;
        } else if ctrl.code == CtrlCode::TooManyRequests.as_u16() {
            limited += 1;
        } else {
            panic!("unexpected ctrl code {}", ctrl.code);
        }
    }

    assert_eq!(accepted, 5);
    assert_eq!(limited, 6);

    // The session is still alive: a follow-up `hi` still gets a reply once
    // the bucket has refilled enough to admit one more frame.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    u1.send(&ClientFrame {
        id: Some("alive-check".to_owned()),
        hi: Some(chat_protocol::HiPayload { ver: "1".to_owned(), ua: None, dev: None, lang: None }),
        ..Default::default()
    })
    .await
    .unwrap();
    let ctrl = u1.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());
}
