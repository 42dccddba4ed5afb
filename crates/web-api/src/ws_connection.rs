use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use domain::{CloseReason, ConnectionHandle, ConnectionId, DeliveryError, UserId};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{mpsc, watch};

use application::Dispatcher;

use crate::state::AppState;

/// 注册表中代表一条 WebSocket 连接的句柄
///
/// 出站帧进入有界队列，由写任务串行写到 socket；队列满或写任务已结束时发送立即失败。
/// 关闭请求走单独的 watch 通道，不受出站队列积压影响。
pub struct WsHandle {
    connection_id: ConnectionId,
    outbound: mpsc::Sender<String>,
    closer: watch::Sender<Option<CloseReason>>,
}

impl WsHandle {
    fn new(outbound: mpsc::Sender<String>, closer: watch::Sender<Option<CloseReason>>) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            outbound,
            closer,
        }
    }
}

impl ConnectionHandle for WsHandle {
    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn send(&self, payload: String) -> Result<(), DeliveryError> {
        self.outbound.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self, reason: CloseReason) {
        self.closer.send_replace(Some(reason));
    }
}

/// 单条已通过准入的中继连接
///
/// 读任务把客户端帧交给 [`Dispatcher`] 并把应答写回同一连接，
/// 写任务负责所有对 socket 的写操作。任意一个任务结束即视为连接结束。
pub struct RelayConnection {
    socket: WebSocket,
    state: AppState,
    user_id: UserId,
}

impl RelayConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: UserId) -> Self {
        Self {
            socket,
            state,
            user_id,
        }
    }

    /// 登记连接并运行读写循环，返回前注销自己的那条登记
    pub async fn run(self) {
        let Self {
            socket,
            state,
            user_id,
        } = self;

        let (outbound_tx, outbound_rx) = mpsc::channel(state.outbound_buffer);
        let (close_tx, close_rx) = watch::channel(None);
        let handle = Arc::new(WsHandle::new(outbound_tx.clone(), close_tx));
        let connection_id = handle.connection_id();

        if let Err(err) = state.relay.connect(user_id.clone(), handle).await {
            tracing::warn!(user_id = %user_id, error = %err, "WebSocket 连接被拒绝");
            refuse(socket, CloseReason::already_connected()).await;
            return;
        }

        tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket 连接已建立");

        let (sender, incoming) = socket.split();

        let mut send_task = tokio::spawn(write_loop(sender, outbound_rx, close_rx));
        let mut recv_task = tokio::spawn(read_loop(
            incoming,
            state.dispatcher.clone(),
            user_id.clone(),
            outbound_tx,
        ));

        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!(user_id = %user_id, "WebSocket发送任务完成");
                recv_task.abort();
            }
            _ = &mut recv_task => {
                tracing::debug!(user_id = %user_id, "WebSocket接收任务完成");
                send_task.abort();
            }
        }

        state.relay.release(&user_id, connection_id).await;
        tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket连接已断开");
    }
}

/// 以关闭帧拒绝一条已升级但不会被登记的连接
pub(crate) async fn refuse(mut socket: WebSocket, reason: CloseReason) {
    tracing::debug!(code = reason.code, reason = %reason.reason, "refusing websocket connection");
    if let Err(err) = socket.send(WsMessage::Close(Some(close_frame(reason)))).await {
        tracing::debug!(error = %err, "Failed to send close frame");
    }
}

fn close_frame(reason: CloseReason) -> CloseFrame {
    CloseFrame {
        code: reason.code,
        reason: reason.reason.into(),
    }
}

async fn read_loop(
    mut incoming: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: UserId,
    replies: mpsc::Sender<String>,
) {
    while let Some(message) = incoming.next().await {
        let frame = match message {
            Ok(WsMessage::Text(text)) => dispatcher.dispatch(&user_id, text.as_str().as_bytes()).await,
            Ok(WsMessage::Binary(data)) => dispatcher.dispatch(&user_id, &data).await,
            Ok(WsMessage::Close(_)) => {
                tracing::info!(user_id = %user_id, "WebSocket收到关闭消息");
                break;
            }
            // ping/pong 由底层协议栈处理
            Ok(_) => continue,
            Err(err) => {
                tracing::info!(user_id = %user_id, error = %err, "WebSocket连接异常断开");
                break;
            }
        };

        let payload = match frame.to_text() {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize websocket reply");
                continue;
            }
        };

        // 应答等待队列空位，不同于广播的立即失败
        if replies.send(payload).await.is_err() {
            tracing::warn!(user_id = %user_id, "Failed to queue reply");
            break;
        }
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut outbound: mpsc::Receiver<String>,
    mut close_rx: watch::Receiver<Option<CloseReason>>,
) {
    loop {
        tokio::select! {
            changed = close_rx.changed() => {
                let reason = match changed {
                    Ok(()) => close_rx.borrow_and_update().clone(),
                    Err(_) => None,
                };
                if let Some(reason) = reason {
                    if sender.send(WsMessage::Close(Some(close_frame(reason)))).await.is_err() {
                        tracing::debug!("Failed to send close frame");
                    }
                }
                break;
            }
            payload = outbound.recv() => {
                let Some(text) = payload else { break };
                if sender.send(WsMessage::Text(text.into())).await.is_err() {
                    tracing::warn!("Failed to send text message");
                    break;
                }
            }
        }
    }

    if let Err(err) = sender.close().await {
        tracing::debug!(error = %err, "Failed to close websocket sink");
    }
}
