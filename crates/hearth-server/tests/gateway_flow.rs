use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt;

use hearth_db::Database;
use hearth_server::app::{build_router, build_state};
use hearth_server::config::Config;

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    router: Router,
}

impl TestServer {
    async fn start(pairs: &[(&str, &str)]) -> Self {
        let pairs: Vec<(String, String)> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let config = Config::from_lookup(|key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
            .expect("config");
        let router = build_router(build_state(&config, Database::open_in_memory().expect("db")));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let served = router.clone();
        tokio::spawn(async move {
            axum::serve(listener, served).await.ok();
        });

        Self { addr, router }
    }

    async fn http(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn login(&self, username: &str) -> String {
        let req = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "passcode": "changeme", "username": username }).to_string()))
            .expect("request");
        let (status, body) = self.http(req).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    async fn create_channel(&self, token: &str, name: &str) -> i64 {
        let req = Request::post("/api/channels")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(json!({ "name": name }).to_string()))
            .expect("request");
        let (status, body) = self.http(req).await;
        assert_eq!(status, StatusCode::OK);
        body["channel"]["id"].as_i64().expect("channel id")
    }

    async fn messages(&self, token: &str, channel_id: i64) -> Vec<Value> {
        let req = Request::get(format!("/api/messages/{}", channel_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .expect("request");
        let (_, body) = self.http(req).await;
        body["messages"].as_array().cloned().unwrap_or_default()
    }

    /// Open a gateway connection and consume its `ready` event.
    async fn connect(&self, token: &str) -> (Client, Value) {
        let url = format!("ws://{}/gateway?token={}", self.addr, token);
        let (mut ws, _) = connect_async(url).await.expect("ws connect");
        let ready = next_event(&mut ws).await;
        assert_eq!(ready["type"], "ready");
        (ws, ready["data"].clone())
    }
}

async fn send(ws: &mut Client, command: Value) {
    ws.send(WsMessage::text(command.to_string())).await.expect("ws send");
}

/// Next text frame as JSON, skipping heartbeat frames.
async fn next_event(ws: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("event json");
        }
    }
}

/// Assert nothing but heartbeat frames arrive for a short while.
async fn expect_silence(ws: &mut Client) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(WsMessage::Text(text)))) => panic!("unexpected event: {}", text.as_str()),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("connection ended: {:?}", other),
        }
    }
}

/// Commands on one connection are applied in order, so an invalid command's
/// error reply proves everything sent before it has been handled.
async fn barrier(ws: &mut Client) {
    send(ws, json!({ "type": "send_message", "data": {} })).await;
    let event = next_event(ws).await;
    assert_eq!(event["type"], "error");
}

async fn join(ws: &mut Client, channel_id: i64) {
    send(ws, json!({ "type": "join_channel", "data": { "channelId": channel_id } })).await;
    barrier(ws).await;
}

#[tokio::test]
async fn ready_carries_the_session_identity() {
    let server = TestServer::start(&[]).await;
    let token = server.login("alice").await;
    let (mut ws, identity) = server.connect(&token).await;
    assert_eq!(identity["username"], "alice");
    assert!(identity["userId"].as_str().unwrap().starts_with("u_"));

    // A claimed identity does not replace the bound one
    send(&mut ws, json!({ "type": "identify", "data": { "username": "mallory" } })).await;
    expect_silence(&mut ws).await;
}

#[tokio::test]
async fn upgrade_without_a_session_is_rejected() {
    let server = TestServer::start(&[]).await;
    for url in [
        format!("ws://{}/gateway", server.addr),
        format!("ws://{}/gateway?token=not-a-token", server.addr),
    ] {
        match connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 401);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("upgrade should have been rejected"),
        }
    }
}

#[tokio::test]
async fn new_messages_reach_channel_subscribers_only() {
    let server = TestServer::start(&[]).await;
    let alice_token = server.login("alice").await;
    let bob_token = server.login("bob").await;
    let general = server.create_channel(&alice_token, "general").await;
    let random = server.create_channel(&alice_token, "random").await;

    let (mut alice, _) = server.connect(&alice_token).await;
    let (mut bob, _) = server.connect(&bob_token).await;
    join(&mut alice, general).await;
    join(&mut bob, random).await;

    send(&mut alice, json!({ "type": "send_message", "data": { "channelId": general, "text": "hello" } })).await;
    let event = next_event(&mut alice).await;
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["data"]["text"], "hello");
    assert_eq!(event["data"]["authorUsername"], "alice");
    assert_eq!(event["data"]["channelId"], general);

    expect_silence(&mut bob).await;
    assert_eq!(server.messages(&bob_token, general).await.len(), 1);
}

#[tokio::test]
async fn channel_creation_is_announced_to_everyone() {
    let server = TestServer::start(&[]).await;
    let token = server.login("alice").await;
    let (mut ws, _) = server.connect(&token).await;

    let id = server.create_channel(&token, "general").await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "channel_created");
    assert_eq!(event["data"]["id"], id);
    assert_eq!(event["data"]["name"], "general");
}

#[tokio::test]
async fn reaction_toggle_round_trip() {
    let server = TestServer::start(&[]).await;
    let alice_token = server.login("alice").await;
    let bob_token = server.login("bob").await;
    let general = server.create_channel(&alice_token, "general").await;

    let (mut alice, _) = server.connect(&alice_token).await;
    let (mut bob, bob_identity) = server.connect(&bob_token).await;
    join(&mut alice, general).await;
    join(&mut bob, general).await;

    send(&mut alice, json!({ "type": "send_message", "data": { "channelId": general, "text": "hi" } })).await;
    let message_id = next_event(&mut alice).await["data"]["id"].as_i64().unwrap();
    next_event(&mut bob).await;

    let toggle = json!({ "type": "toggle_reaction", "data": { "messageId": message_id, "emoji": "👍" } });
    send(&mut bob, toggle.clone()).await;
    for ws in [&mut alice, &mut bob] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "reaction_added");
        assert_eq!(event["data"]["messageId"], message_id);
        assert_eq!(event["data"]["channelId"], general);
        assert_eq!(event["data"]["emoji"], "👍");
        assert_eq!(event["data"]["userId"], bob_identity["userId"]);
    }
    let reactions = server.messages(&alice_token, general).await[0]["reactions"].clone();
    assert_eq!(reactions.as_array().unwrap().len(), 1);

    send(&mut bob, toggle).await;
    for ws in [&mut alice, &mut bob] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "reaction_removed");
        assert_eq!(event["data"]["messageId"], message_id);
        assert_eq!(event["data"]["emoji"], "👍");
    }
    let reactions = server.messages(&alice_token, general).await[0]["reactions"].clone();
    assert_eq!(reactions, json!([]));
}

#[tokio::test]
async fn only_the_author_can_edit_or_delete() {
    let server = TestServer::start(&[]).await;
    let alice_token = server.login("alice").await;
    let bob_token = server.login("bob").await;
    let general = server.create_channel(&alice_token, "general").await;

    let (mut alice, _) = server.connect(&alice_token).await;
    let (mut bob, _) = server.connect(&bob_token).await;
    join(&mut alice, general).await;
    join(&mut bob, general).await;

    send(&mut alice, json!({ "type": "send_message", "data": { "channelId": general, "text": "original" } })).await;
    let message_id = next_event(&mut alice).await["data"]["id"].as_i64().unwrap();
    next_event(&mut bob).await;

    send(&mut bob, json!({ "type": "edit_message", "data": { "messageId": message_id, "newText": "hacked" } })).await;
    send(&mut bob, json!({ "type": "delete_message", "data": { "messageId": message_id } })).await;
    barrier(&mut bob).await;
    expect_silence(&mut alice).await;

    let history = server.messages(&alice_token, general).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["text"], "original");
    assert_eq!(history[0]["editedAt"], Value::Null);

    send(&mut alice, json!({ "type": "edit_message", "data": { "messageId": message_id, "newText": "fixed" } })).await;
    for ws in [&mut alice, &mut bob] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "message_edited");
        assert_eq!(event["data"]["text"], "fixed");
        assert!(event["data"]["editedAt"].is_i64());
    }

    send(&mut alice, json!({ "type": "delete_message", "data": { "messageId": message_id } })).await;
    for ws in [&mut alice, &mut bob] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "message_deleted");
        assert_eq!(event["data"], json!({ "messageId": message_id, "channelId": general }));
    }
    assert!(server.messages(&alice_token, general).await.is_empty());
}

#[tokio::test]
async fn invalid_commands_are_answered_to_the_sender_only() {
    let server = TestServer::start(&[]).await;
    let alice_token = server.login("alice").await;
    let bob_token = server.login("bob").await;
    let general = server.create_channel(&alice_token, "general").await;

    let (mut alice, _) = server.connect(&alice_token).await;
    let (mut bob, _) = server.connect(&bob_token).await;
    join(&mut bob, general).await;

    send(&mut alice, json!({ "type": "send_message", "data": { "channelId": general, "text": "" } })).await;
    let event = next_event(&mut alice).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["code"], "invalid_input");

    alice.send(WsMessage::text("not json".to_string())).await.unwrap();
    assert_eq!(next_event(&mut alice).await["type"], "error");

    expect_silence(&mut bob).await;
    assert!(server.messages(&alice_token, general).await.is_empty());
}

#[tokio::test]
async fn legacy_scope_broadcasts_mutations_to_everyone() {
    let server = TestServer::start(&[("HEARTH_BROADCAST_SCOPE", "global")]).await;
    let alice_token = server.login("alice").await;
    let bob_token = server.login("bob").await;
    let general = server.create_channel(&alice_token, "general").await;

    let (mut alice, _) = server.connect(&alice_token).await;
    let (mut bob, _) = server.connect(&bob_token).await;
    join(&mut alice, general).await;

    send(&mut alice, json!({ "type": "send_message", "data": { "channelId": general, "text": "hi" } })).await;
    let message_id = next_event(&mut alice).await["data"]["id"].as_i64().unwrap();

    // Bob never joined: no new_message, but the reaction still reaches him
    send(&mut alice, json!({ "type": "react", "data": { "messageId": message_id, "reaction": "🎉" } })).await;
    assert_eq!(next_event(&mut alice).await["type"], "reaction_added");
    let event = next_event(&mut bob).await;
    assert_eq!(event["type"], "reaction_added");
    assert_eq!(event["data"]["emoji"], "🎉");
}
