//! Room lifecycle: create, invite, member-joined fan-out, kick, leave.

use chat_protocol::{ClientFrame, CtrlCode, InfoWhat, RoomPayload};
use chat_test_utils::{register_user, spawn_server, TestClient};
use uuid::Uuid;

#[tokio::test]
async fn create_invite_kick_round_trip() {
    let url = spawn_server().await;

    let mut owner = TestClient::connect(&url).await.unwrap();
    let mut member = TestClient::connect(&url).await.unwrap();
    register_user(&mut owner, "alice", "hunter2").await;
    let member_id = register_user(&mut member, "bob", "hunter2").await;

    owner
        .send(&ClientFrame {
            id: Some("create".to_owned()),
            room: Some(RoomPayload {
                id: "new".to_owned(),
                action: "create".to_owned(),
                user: None,
                desc: Some(serde_json::json!({"name": "general"})),
                disappearing_ttl: None,
                no_screenshots: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = owner.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Created.as_u16());
    let conv = Uuid::parse_str(ctrl.params.unwrap()["conv"].as_str().unwrap()).unwrap();

    owner
        .send(&ClientFrame {
            id: Some("invite".to_owned()),
            room: Some(RoomPayload {
                id: conv.to_string(),
                action: "invite".to_owned(),
                user: Some(member_id),
                desc: None,
                disappearing_ttl: None,
                no_screenshots: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = owner.recv_matching(|f| f.ctrl.is_some()).await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());
    // The initiating session is skipped on its own broadcast; the invited
    // member (now online and a conversation member) observes it instead.
    let info = member.recv_matching(|f| f.info.is_some()).await.unwrap().info.unwrap();
    assert_eq!(info.what, InfoWhat::MemberJoined);

    owner
        .send(&ClientFrame {
            id: Some("kick".to_owned()),
            room: Some(RoomPayload {
                id: conv.to_string(),
                action: "kick".to_owned(),
                user: Some(member_id),
                desc: None,
                disappearing_ttl: None,
                no_screenshots: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = owner.recv_matching(|f| f.ctrl.is_some()).await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Ok.as_u16());

    // The kicked member still hears about their own removal even though
    // they're no longer a conversation member by the time the broadcast goes out.
    let info = member.recv_matching(|f| f.info.is_some()).await.unwrap().info.unwrap();
    assert_eq!(info.what, InfoWhat::MemberKicked);
}

#[tokio::test]
async fn non_admin_cannot_invite() {
    let url = spawn_server().await;

    let mut owner = TestClient::connect(&url).await.unwrap();
    let mut outsider = TestClient::connect(&url).await.unwrap();
    register_user(&mut owner, "alice", "hunter2").await;
    register_user(&mut outsider, "carol", "hunter2").await;

    owner
        .send(&ClientFrame {
            id: Some("create".to_owned()),
            room: Some(RoomPayload {
                id: "new".to_owned(),
                action: "create".to_owned(),
                user: None,
                desc: None,
                disappearing_ttl: None,
                no_screenshots: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = owner.recv().await.unwrap().ctrl.unwrap();
    let conv = Uuid::parse_str(ctrl.params.unwrap()["conv"].as_str().unwrap()).unwrap();

    outsider
        .send(&ClientFrame {
            id: Some("invite".to_owned()),
            room: Some(RoomPayload {
                id: conv.to_string(),
                action: "invite".to_owned(),
                user: Some(Uuid::new_v4()),
                desc: None,
                disappearing_ttl: None,
                no_screenshots: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ctrl = outsider.recv().await.unwrap().ctrl.unwrap();
    assert_eq!(ctrl.code, CtrlCode::Forbidden.as_u16());
}
