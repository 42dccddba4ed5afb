//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 握手与准入、每连接的读写循环，以及少量 HTTP 接口。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
pub use ws_connection::{RelayConnection, WsHandle};
