use std::time::Duration;

use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite};

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws::{
    WsStream, assert_nothing_pending, expect_server_close, next_event, next_non_presence,
    send_event,
};

/// Waits until the registry reports `expected` online users.
async fn wait_for_presence(app: &TestApp, expected: usize) {
    for _ in 0..100 {
        if app.state.presence.snapshot().count == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "Presence never reached {expected}, still {}",
        app.state.presence.snapshot().count
    );
}

/// Reads frames until a presence update with `count` users arrives.
async fn expect_presence_count(ws: &mut WsStream, count: u64) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["type"] == "onlineUsersUpdate" && event["data"]["count"] == count {
            return event;
        }
    }
}

#[tokio::test]
async fn ws_rejects_missing_or_invalid_token() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let (mut observer, _) = app.connect_ws(&alice.access_token).await;

    for url in [
        format!("ws://{}/ws", app.addr),
        app.ws_url("not-a-token"),
    ] {
        match connect_async(&url).await {
            Err(tungstenite::Error::Http(resp)) => {
                assert_eq!(resp.status().as_u16(), 401);
            }
            Err(e) => panic!("Unexpected handshake error: {e}"),
            Ok(_) => panic!("Handshake should have been rejected for {url}"),
        }
    }

    assert_eq!(app.state.presence.snapshot().count, 1);
    assert_nothing_pending(&mut observer).await;
}

#[tokio::test]
async fn presence_tracks_connects_and_disconnects() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, first) = app.connect_ws(&alice.access_token).await;
    assert_eq!(first["data"]["count"], 1);
    assert_eq!(first["data"]["users"][0]["id"], alice.id());
    assert_eq!(first["data"]["users"][0]["name"], "alice");

    let (mut ws_b, first_b) = app.connect_ws(&bob.access_token).await;
    assert_eq!(first_b["data"]["count"], 2);
    let seen_by_a = expect_presence_count(&mut ws_a, 2).await;
    let names: Vec<&str> = seen_by_a["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);

    let resp = app
        .auth_get("/api/online-users", &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["count"], 2);

    ws_b.close(None).await.unwrap();
    let update = expect_presence_count(&mut ws_a, 1).await;
    assert_eq!(update["data"]["users"][0]["name"], "alice");
    wait_for_presence(&app, 1).await;
}

#[tokio::test]
async fn abrupt_drop_removes_presence() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (ws_b, _) = app.connect_ws(&bob.access_token).await;
    expect_presence_count(&mut ws_a, 2).await;

    // No close frame, just the TCP stream going away.
    drop(ws_b);

    expect_presence_count(&mut ws_a, 1).await;
    wait_for_presence(&app, 1).await;
}

#[tokio::test]
async fn ws_send_broadcasts_and_acks_sender() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    send_event(
        &mut ws_a,
        json!({ "type": "sendMessage", "data": { "content": "  hello room  " } }),
    )
    .await;

    let ack = next_non_presence(&mut ws_a).await;
    assert_eq!(ack["type"], "messageSent");
    assert_eq!(ack["data"]["content"], "hello room");

    let seen = next_non_presence(&mut ws_b).await;
    assert_eq!(seen["type"], "newMessage");
    assert_eq!(seen["data"]["id"], ack["data"]["id"]);
    assert_eq!(seen["data"]["author"]["name"], "alice");

    // The sender gets the ack only, never its own newMessage.
    assert_nothing_pending(&mut ws_a).await;

    let json: Value = app
        .auth_get("/api/messages", &bob.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["messages"][0]["content"], "hello room");
}

#[tokio::test]
async fn rest_send_excludes_sender_connection() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    let msg = app.send_message(&alice, "via http").await;

    let seen = next_non_presence(&mut ws_b).await;
    assert_eq!(seen["type"], "newMessage");
    assert_eq!(seen["data"]["id"], msg["id"]);

    assert_nothing_pending(&mut ws_a).await;
}

#[tokio::test]
async fn mutations_reach_every_connection() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    let msg = app.send_message(&alice, "draft").await;
    let id = msg["id"].as_str().unwrap();
    assert_eq!(next_non_presence(&mut ws_b).await["type"], "newMessage");

    let resp = app
        .auth_put(&format!("/api/messages/{id}"), &alice.access_token)
        .json(&json!({ "content": "final" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_non_presence(ws).await;
        assert_eq!(event["type"], "messageEdited");
        assert_eq!(event["data"]["content"], "final");
        assert_eq!(event["data"]["isEdited"], true);
    }

    let resp = app
        .auth_post(&format!("/api/messages/{id}/reactions"), &bob.access_token)
        .json(&json!({ "emoji": "🔥" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_non_presence(ws).await;
        assert_eq!(event["type"], "reactionAdded");
        assert_eq!(event["data"]["reactions"][0]["emoji"], "🔥");
    }

    let resp = app
        .auth_delete(&format!("/api/messages/{id}"), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_non_presence(ws).await;
        assert_eq!(event["type"], "messageDeleted");
        assert_eq!(event["data"]["id"], id);
    }
}

#[tokio::test]
async fn ws_edit_delete_and_react() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    let msg = app.send_message(&alice, "over the wire").await;
    let id = msg["id"].as_str().unwrap();
    assert_eq!(next_non_presence(&mut ws_b).await["type"], "newMessage");

    send_event(
        &mut ws_b,
        json!({ "type": "addReaction", "data": { "messageId": id, "emoji": "👀" } }),
    )
    .await;
    assert_eq!(next_non_presence(&mut ws_a).await["type"], "reactionAdded");
    assert_eq!(next_non_presence(&mut ws_b).await["type"], "reactionAdded");

    // Bob may not edit Alice's message; only Bob hears about it.
    send_event(
        &mut ws_b,
        json!({ "type": "editMessage", "data": { "messageId": id, "content": "mine now" } }),
    )
    .await;
    let err = next_non_presence(&mut ws_b).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["error"], "forbidden");
    assert_nothing_pending(&mut ws_a).await;

    send_event(
        &mut ws_a,
        json!({ "type": "editMessage", "data": { "messageId": id, "content": "edited" } }),
    )
    .await;
    assert_eq!(next_non_presence(&mut ws_a).await["type"], "messageEdited");
    assert_eq!(next_non_presence(&mut ws_b).await["type"], "messageEdited");

    send_event(
        &mut ws_a,
        json!({ "type": "deleteMessage", "data": { "messageId": id } }),
    )
    .await;
    assert_eq!(next_non_presence(&mut ws_a).await["type"], "messageDeleted");
    assert_eq!(next_non_presence(&mut ws_b).await["type"], "messageDeleted");
}

#[tokio::test]
async fn typing_reaches_others_only() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    send_event(
        &mut ws_a,
        json!({ "type": "typing", "data": { "isTyping": true } }),
    )
    .await;

    let event = next_non_presence(&mut ws_b).await;
    assert_eq!(event["type"], "userTyping");
    assert_eq!(event["data"]["userId"], alice.id());
    assert_eq!(event["data"]["name"], "alice");
    assert_eq!(event["data"]["isTyping"], true);

    assert_nothing_pending(&mut ws_a).await;
}

#[tokio::test]
async fn invalid_ws_send_errors_sender_only() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut ws_a, _) = app.connect_ws(&alice.access_token).await;
    let (mut ws_b, _) = app.connect_ws(&bob.access_token).await;

    send_event(
        &mut ws_a,
        json!({ "type": "sendMessage", "data": { "content": "   " } }),
    )
    .await;
    let err = next_non_presence(&mut ws_a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["error"], "validation");

    send_event(&mut ws_a, json!({ "type": "shout", "data": 42 })).await;
    let err = next_non_presence(&mut ws_a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["error"], "bad_request");

    assert_nothing_pending(&mut ws_b).await;
    assert_eq!(app.store.len(), 0);
}

#[tokio::test]
async fn reconnect_with_same_identity_replaces_old_socket() {
    let app = TestApp::spawn().await;
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (mut observer, _) = app.connect_ws(&bob.access_token).await;
    let (mut first, _) = app.connect_ws(&alice.access_token).await;
    expect_presence_count(&mut observer, 2).await;

    let (mut second, snapshot) = app.connect_ws(&alice.access_token).await;
    assert_eq!(snapshot["data"]["count"], 2);

    // The superseded socket is shut by the server, and its teardown must
    // not evict the live one.
    expect_server_close(&mut first).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.state.presence.snapshot().count, 2);
    assert!(app.state.presence.is_online(&alice.identity.id));

    let msg = app.send_message(&bob, "still there?").await;
    let event = next_non_presence(&mut second).await;
    assert_eq!(event["type"], "newMessage");
    assert_eq!(event["data"]["id"], msg["id"]);

    assert_nothing_pending(&mut observer).await;
}
