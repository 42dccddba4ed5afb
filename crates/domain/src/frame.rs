//! 服务端回给发送者的应答帧
//!
//! 线上格式固定为 `{"status": ...}` 或 `{"error": ...}`，客户端按字段名区分。

use serde::Serialize;
use thiserror::Error;

use crate::value_objects::Topic;

/// 客户端可见的校验错误，`Display` 与序列化结果都是线上字符串本身
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameError {
    #[error("invalid message format")]
    #[serde(rename = "invalid message format")]
    InvalidFormat,
    #[error("topic is required for subscription")]
    #[serde(rename = "topic is required for subscription")]
    TopicRequired,
    #[error("topic is required for unsubscription")]
    #[serde(rename = "topic is required for unsubscription")]
    UnsubscribeTopicRequired,
    #[error("both 'to' and 'message' are required for direct messages")]
    #[serde(rename = "both 'to' and 'message' are required for direct messages")]
    DirectFieldsRequired,
    #[error("both 'topic' and 'message' are required for publish")]
    #[serde(rename = "both 'topic' and 'message' are required for publish")]
    PublishFieldsRequired,
    #[error("failed to send message")]
    #[serde(rename = "failed to send message")]
    SendFailed,
    #[error("unknown message type")]
    #[serde(rename = "unknown message type")]
    UnknownType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Subscribed,
    Unsubscribed,
    Published,
    #[serde(rename = "message sent")]
    MessageSent,
}

/// 应答帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Ack {
        status: AckStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<Topic>,
    },
    Error {
        error: FrameError,
    },
}

impl ServerFrame {
    pub fn subscribed(topic: Topic) -> Self {
        Self::Ack {
            status: AckStatus::Subscribed,
            topic: Some(topic),
        }
    }

    pub fn unsubscribed(topic: Topic) -> Self {
        Self::Ack {
            status: AckStatus::Unsubscribed,
            topic: Some(topic),
        }
    }

    pub fn published(topic: Topic) -> Self {
        Self::Ack {
            status: AckStatus::Published,
            topic: Some(topic),
        }
    }

    pub fn message_sent() -> Self {
        Self::Ack {
            status: AckStatus::MessageSent,
            topic: None,
        }
    }

    pub fn error(error: FrameError) -> Self {
        Self::Error { error }
    }

    /// 序列化为文本帧
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<FrameError> for ServerFrame {
    fn from(error: FrameError) -> Self {
        Self::error(error)
    }
}
