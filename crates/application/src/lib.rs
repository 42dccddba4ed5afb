//! 应用层实现。
//!
//! 围绕领域模型提供中继用例：连接注册表、主题索引、广播/点对点发送，
//! 以及把客户端帧路由到这些操作的分发器。

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod relay;
pub mod topics;

pub use dispatch::Dispatcher;
pub use error::RelayError;
pub use registry::{ConnectionRegistry, SharedHandle};
pub use relay::{BroadcastReport, Relay, RelayPolicy, RelayStats};
pub use topics::TopicIndex;
