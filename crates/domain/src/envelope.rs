//! 客户端入站帧的解码与校验
//!
//! 解码分两步：先按信封结构反序列化（失败即格式错误），
//! 再根据 `type` 检查必填字段，得到可以直接执行的 [`Command`]。

use serde::Deserialize;

use crate::frame::FrameError;
use crate::value_objects::{Topic, UserId};

/// 入站帧的原始信封
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// 缺失或为 null 都按空类型处理
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic: Option<String>,
    pub to: Option<String>,
    pub message: Option<String>,
}

/// 校验通过的客户端指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Publish { topic: Topic, message: String },
    Direct { to: UserId, message: String },
}

impl Envelope {
    /// 解析一帧原始数据
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        serde_json::from_slice(raw).map_err(|_| FrameError::InvalidFormat)
    }

    /// 按消息类型校验字段
    pub fn into_command(self) -> Result<Command, FrameError> {
        match self.kind.as_deref().unwrap_or("") {
            "subscribe" => {
                let topic = topic_of(self.topic).ok_or(FrameError::TopicRequired)?;
                Ok(Command::Subscribe { topic })
            }
            "unsubscribe" => {
                let topic = topic_of(self.topic).ok_or(FrameError::UnsubscribeTopicRequired)?;
                Ok(Command::Unsubscribe { topic })
            }
            "publish" => match (topic_of(self.topic), non_empty(self.message)) {
                (Some(topic), Some(message)) => Ok(Command::Publish { topic, message }),
                _ => Err(FrameError::PublishFieldsRequired),
            },
            "direct" => {
                let to = non_empty(self.to).and_then(|to| UserId::parse(to).ok());
                match (to, non_empty(self.message)) {
                    (Some(to), Some(message)) => Ok(Command::Direct { to, message }),
                    _ => Err(FrameError::DirectFieldsRequired),
                }
            }
            _ => Err(FrameError::UnknownType),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn topic_of(value: Option<String>) -> Option<Topic> {
    non_empty(value).and_then(|topic| Topic::parse(topic).ok())
}
