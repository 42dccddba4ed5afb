mod support;

use config::ReconnectPolicy;
use serde_json::json;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Error as WsError},
};

use support::{build_state, next_close, next_json, send_text, TestServer};

#[tokio::test]
async fn missing_credentials_are_refused_with_close_frame() {
    let server = TestServer::start().await;

    let (mut ws, _) = connect_async(server.ws_url()).await.expect("upgrade");
    let frame = next_close(&mut ws).await;

    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason.as_str(), "User ID is required");
    assert_eq!(server.state.relay.stats().await.online_users, 0);
}

#[tokio::test]
async fn token_with_empty_user_id_is_refused_with_close_frame() {
    let server = TestServer::start().await;
    let url = format!("{}?token={}", server.ws_url(), server.token(""));

    let (mut ws, _) = connect_async(url).await.expect("upgrade");
    let frame = next_close(&mut ws).await;

    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason.as_str(), "User ID is required");
}

#[tokio::test]
async fn invalid_token_is_rejected_before_upgrade() {
    let server = TestServer::start().await;
    let url = format!("{}?token=not-a-jwt", server.ws_url());

    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}

#[tokio::test]
async fn query_token_admits_user() {
    let server = TestServer::start().await;
    let url = format!("{}?token={}", server.ws_url(), server.token("alice"));

    let (mut ws, _) = connect_async(url).await.expect("upgrade");
    send_text(&mut ws, r#"{"type":"subscribe","topic":"general"}"#).await;

    assert_eq!(
        next_json(&mut ws).await,
        json!({"status": "subscribed", "topic": "general"})
    );
    server.wait_online("alice", true).await;
}

#[tokio::test]
async fn reject_policy_refuses_second_connection() {
    let server = TestServer::spawn(build_state(ReconnectPolicy::Reject)).await;
    let mut first = server.connect("alice").await;
    server.wait_online("alice", true).await;

    let mut second = server.connect("alice").await;
    let frame = next_close(&mut second).await;
    assert_eq!(frame.code, CloseCode::Policy);
    assert_eq!(frame.reason.as_str(), "User is already connected");

    send_text(&mut first, r#"{"type":"subscribe","topic":"general"}"#).await;
    assert_eq!(
        next_json(&mut first).await,
        json!({"status": "subscribed", "topic": "general"})
    );
}
