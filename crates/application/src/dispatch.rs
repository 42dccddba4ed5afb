//! 入站帧分发
//!
//! 每个连接循环把读到的原始帧交给 [`Dispatcher`]：解码信封、执行对应的中继操作，
//! 再返回需要写回给发送者的应答帧。任何一帧出错都只产生错误帧，不会终止连接。

use std::sync::Arc;

use domain::{Command, Envelope, FrameError, ServerFrame, UserId};
use tracing::{debug, info, warn};

use crate::relay::Relay;

#[derive(Clone)]
pub struct Dispatcher {
    relay: Arc<Relay>,
}

impl Dispatcher {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// 处理一帧原始数据
    pub async fn dispatch(&self, sender: &UserId, raw: &[u8]) -> ServerFrame {
        debug!(user_id = %sender, bytes = raw.len(), "Received message from user");

        let command = match Envelope::decode(raw).and_then(Envelope::into_command) {
            Ok(command) => command,
            Err(err) => {
                debug!(user_id = %sender, error = %err, "Rejected client frame");
                return err.into();
            }
        };

        self.execute(sender, command).await
    }

    /// 执行已经通过校验的指令
    pub async fn execute(&self, sender: &UserId, command: Command) -> ServerFrame {
        match command {
            Command::Subscribe { topic } => {
                self.relay.subscribe(sender.clone(), topic.clone()).await;
                ServerFrame::subscribed(topic)
            }
            Command::Unsubscribe { topic } => {
                self.relay.unsubscribe(sender, &topic).await;
                ServerFrame::unsubscribed(topic)
            }
            Command::Publish { topic, message } => {
                let report = self.relay.broadcast(&topic, &message).await;
                info!(
                    user_id = %sender,
                    topic = %topic,
                    delivered = report.delivered,
                    failed = report.failed,
                    "Published message to topic"
                );
                ServerFrame::published(topic)
            }
            Command::Direct { to, message } => {
                match self.relay.send_direct(&to, &message).await {
                    Ok(()) => ServerFrame::message_sent(),
                    Err(err) => {
                        warn!(
                            user_id = %sender,
                            recipient = %to,
                            error = %err,
                            "Failed to send direct message"
                        );
                        FrameError::SendFailed.into()
                    }
                }
            }
        }
    }
}
