//! 在线连接注册表
//!
//! 用户标识到连接句柄的映射，是"谁在线"的唯一来源。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use domain::{ConnectionHandle, ConnectionId, UserId};
use tokio::sync::RwLock;

pub type SharedHandle = Arc<dyn ConnectionHandle>;

/// 内存中的连接注册表
///
/// 所有操作都只在单个读写锁内完成，不会对外暴露底层 map。
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, SharedHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接，同名旧连接被覆盖并返回给调用方处理
    pub async fn connect(&self, user_id: UserId, handle: SharedHandle) -> Option<SharedHandle> {
        let mut connections = self.connections.write().await;
        connections.insert(user_id, handle)
    }

    /// 仅当该用户不在线时注册；否则把新句柄原样退回
    pub async fn try_connect(&self, user_id: UserId, handle: SharedHandle) -> Result<(), SharedHandle> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&user_id) {
            return Err(handle);
        }
        connections.insert(user_id, handle);
        Ok(())
    }

    /// 注销连接，不存在时什么也不做
    pub async fn disconnect(&self, user_id: &UserId) -> Option<SharedHandle> {
        self.disconnect_then(user_id, || async {}).await
    }

    /// 注销连接，并在仍持有写锁时执行 `on_removed`
    ///
    /// `on_removed` 完成之前，同一用户的重连会一直等待写锁。
    /// 回调里只能获取排在注册表之后的锁（主题索引）。
    pub async fn disconnect_then<F, Fut>(&self, user_id: &UserId, on_removed: F) -> Option<SharedHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(user_id)?;
        on_removed().await;
        Some(removed)
    }

    /// 只有当前登记的正是 `connection_id` 这条连接时才注销
    ///
    /// 被替换掉的旧连接退出时走这里，不会误删接替它的新连接。
    pub async fn release(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        self.release_then(user_id, connection_id, || async {}).await
    }

    /// 同 [`release`](Self::release)，注销成功时在持有写锁期间执行 `on_removed`
    pub async fn release_then<F, Fut>(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
        on_removed: F,
    ) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut connections = self.connections.write().await;
        match connections.get(user_id) {
            Some(handle) if handle.connection_id() == connection_id => {
                connections.remove(user_id);
                on_removed().await;
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, user_id: &UserId) -> Option<SharedHandle> {
        let connections = self.connections.read().await;
        connections.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        let connections = self.connections.read().await;
        connections.keys().cloned().collect()
    }
}
