//! 领域模型错误定义
//!
//! 区分参数校验错误与投递错误，投递错误只影响单个接收者。

use thiserror::Error;

use crate::value_objects::UserId;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参数校验失败
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 向单个连接写帧失败的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// 连接的写任务已经结束
    #[error("connection is closed")]
    Closed,
    /// 出站缓冲区已满，接收方消费过慢
    #[error("outbound buffer is full")]
    Backpressure,
}

/// 点对点发送的结果错误
///
/// 两种原因在线协议上会合并为同一个错误帧，这里仍然保留区分，便于日志排查。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectSendError {
    #[error("recipient {0} is not connected")]
    NotConnected(UserId),
    #[error("send failed: {0}")]
    Delivery(#[from] DeliveryError),
}
