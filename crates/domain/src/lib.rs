//! 中继系统核心领域模型
//!
//! 包含用户/主题标识、连接句柄接口、客户端信封解码以及应答帧定义。

pub mod connection;
pub mod envelope;
pub mod errors;
pub mod frame;
pub mod value_objects;

// 重新导出常用类型
pub use connection::*;
pub use envelope::*;
pub use errors::*;
pub use frame::*;
pub use value_objects::*;
