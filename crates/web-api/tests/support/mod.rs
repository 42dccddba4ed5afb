#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{Relay, RelayPolicy};
use config::ReconnectPolicy;
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest, http::header::AUTHORIZATION, protocol::CloseFrame, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState, JwtConfig, JwtService};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "relay-test-secret-key-0123456789";

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn build_state(reconnect: ReconnectPolicy) -> AppState {
    let relay = Arc::new(Relay::new(RelayPolicy {
        reconnect,
        prune_on_disconnect: true,
    }));
    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: TEST_SECRET.to_string(),
        expiration_hours: 1,
    }));
    AppState::new(relay, jwt_service, 16)
}

/// 在随机端口上运行的测试服务器，drop 时优雅关闭
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(state: AppState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub async fn start() -> Self {
        Self::spawn(build_state(ReconnectPolicy::Replace)).await
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn token(&self, user_id: &str) -> String {
        self.state
            .jwt_service
            .generate_token(user_id)
            .expect("token")
    }

    /// 通过 Authorization 头建立连接
    pub async fn connect(&self, user_id: &str) -> WsClient {
        let mut request = self.ws_url().into_client_request().expect("request");
        request.headers_mut().insert(
            AUTHORIZATION,
            format!("Bearer {}", self.token(user_id)).parse().expect("header"),
        );
        let (ws, _) = connect_async(request).await.expect("connect");
        ws
    }

    /// 等待注册表状态满足条件
    pub async fn wait_online(&self, user_id: &str, online: bool) {
        let user_id = UserId::parse(user_id).expect("user id");
        timeout(RECV_TIMEOUT, async {
            while self.state.relay.is_online(&user_id).await != online {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry did not settle");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::text(text.to_owned())).await.expect("send");
}

/// 下一条非控制帧
pub async fn next_message(ws: &mut WsClient) -> Message {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match message {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

pub async fn next_text(ws: &mut WsClient) -> String {
    match next_message(ws).await {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

pub async fn next_json(ws: &mut WsClient) -> Value {
    serde_json::from_str(&next_text(ws).await).expect("json frame")
}

pub async fn next_close(ws: &mut WsClient) -> CloseFrame {
    match next_message(ws).await {
        Message::Close(Some(frame)) => frame,
        other => panic!("expected close frame, got {other:?}"),
    }
}

/// 一段时间内没有收到任何数据帧
pub async fn assert_silent(ws: &mut WsClient) {
    if let Ok(Some(Ok(message))) = timeout(Duration::from_millis(200), ws.next()).await {
        panic!("unexpected frame: {message:?}");
    }
}
