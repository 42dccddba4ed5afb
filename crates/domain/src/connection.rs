//! 连接句柄抽象
//!
//! 注册表只通过这个接口向客户端推送帧，不关心底层传输是 WebSocket 还是测试桩。

use crate::errors::DeliveryError;
use crate::value_objects::ConnectionId;

/// WebSocket 正常关闭
pub const CLOSE_NORMAL: u16 = 1000;
/// WebSocket 策略违规关闭
pub const CLOSE_POLICY: u16 = 1008;

/// 关闭连接时携带的关闭帧内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// 准入时没有拿到用户标识
    pub fn user_id_required() -> Self {
        Self::new(CLOSE_NORMAL, "User ID is required")
    }

    /// 同一用户建立了新连接，旧连接被替换
    pub fn superseded() -> Self {
        Self::new(CLOSE_NORMAL, "superseded by a newer connection")
    }

    /// 拒绝策略下同一用户已经在线
    pub fn already_connected() -> Self {
        Self::new(CLOSE_POLICY, "User is already connected")
    }
}

/// 单个客户端连接的句柄
///
/// `send` 不允许无限期阻塞：广播时一个慢连接不能拖住其他接收者，
/// 因此实现方应当在缓冲区满时直接返回 [`DeliveryError::Backpressure`]。
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait ConnectionHandle: Send + Sync {
    /// 连接标识
    fn connection_id(&self) -> ConnectionId;

    /// 推送一个文本帧
    fn send(&self, payload: String) -> Result<(), DeliveryError>;

    /// 发送关闭帧并结束写任务
    fn close(&self, reason: CloseReason);
}
