//! 中继核心
//!
//! 组合连接注册表与主题索引，对外提供连接管理、订阅、主题广播与点对点发送。
//! 只有注销连接会同时持有两把锁，顺序固定为注册表在前、主题索引在后；
//! 其余操作都只持有其中一把。

use config::{ReconnectPolicy, RelayConfig};
use domain::{CloseReason, ConnectionId, DirectSendError, Topic, UserId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::registry::{ConnectionRegistry, SharedHandle};
use crate::topics::TopicIndex;

/// 中继策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    pub reconnect: ReconnectPolicy,
    pub prune_on_disconnect: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::Replace,
            prune_on_disconnect: true,
        }
    }
}

impl From<&RelayConfig> for RelayPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            reconnect: config.reconnect_policy,
            prune_on_disconnect: config.prune_subscriptions_on_disconnect,
        }
    }
}

/// 一次广播的投递结果，仅用于诊断
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// 订阅了但已不在线
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub online_users: usize,
    pub topics: usize,
}

pub struct Relay {
    registry: ConnectionRegistry,
    topics: TopicIndex,
    policy: RelayPolicy,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayPolicy::default())
    }
}

impl Relay {
    pub fn new(policy: RelayPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            topics: TopicIndex::new(),
            policy,
        }
    }

    /// 登记一条已通过准入的连接
    pub async fn connect(&self, user_id: UserId, handle: SharedHandle) -> Result<(), RelayError> {
        let connection_id = handle.connection_id();

        match self.policy.reconnect {
            ReconnectPolicy::Replace => {
                if let Some(previous) = self.registry.connect(user_id.clone(), handle).await {
                    if previous.connection_id() != connection_id {
                        info!(
                            user_id = %user_id,
                            previous = %previous.connection_id(),
                            connection_id = %connection_id,
                            "closing superseded connection"
                        );
                        previous.close(CloseReason::superseded());
                    }
                }
            }
            ReconnectPolicy::Reject => {
                if self.registry.try_connect(user_id.clone(), handle).await.is_err() {
                    warn!(user_id = %user_id, "rejecting duplicate connection");
                    return Err(RelayError::AlreadyConnected(user_id));
                }
            }
        }

        info!(user_id = %user_id, connection_id = %connection_id, "User connected");
        Ok(())
    }

    /// 无条件注销用户当前的连接
    pub async fn disconnect(&self, user_id: &UserId) {
        let removed = self
            .registry
            .disconnect_then(user_id, || self.prune_subscriptions(user_id))
            .await;
        if removed.is_some() {
            info!(user_id = %user_id, "User disconnected");
        }
    }

    /// 连接循环退出时的清理：只注销属于自己的那条登记
    ///
    /// 订阅清理在注册表写锁内完成，同一用户的重连会等清理结束后才登记，
    /// 因而重连后新建的订阅不会被这次清理带走。
    pub async fn release(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let released = self
            .registry
            .release_then(user_id, connection_id, || self.prune_subscriptions(user_id))
            .await;
        if released {
            info!(user_id = %user_id, "User disconnected");
        } else {
            debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "connection already superseded, registry untouched"
            );
        }
        released
    }

    async fn prune_subscriptions(&self, user_id: &UserId) {
        if self.policy.prune_on_disconnect {
            let pruned = self.topics.unsubscribe_all(user_id).await;
            debug!(user_id = %user_id, pruned, "pruned topic subscriptions");
        }
    }

    pub async fn subscribe(&self, user_id: UserId, topic: Topic) -> bool {
        let added = self.topics.subscribe(user_id.clone(), topic.clone()).await;
        debug!(user_id = %user_id, topic = %topic, added, "subscribe");
        added
    }

    pub async fn unsubscribe(&self, user_id: &UserId, topic: &Topic) -> bool {
        let removed = self.topics.unsubscribe(user_id, topic).await;
        debug!(user_id = %user_id, topic = %topic, removed, "unsubscribe");
        removed
    }

    /// 向主题的所有订阅者尽力投递
    ///
    /// 订阅者集合先取快照再逐个查注册表，发送前重新确认在线，
    /// 单个接收者失败只记录日志，不影响其他接收者。
    pub async fn broadcast(&self, topic: &Topic, payload: &str) -> BroadcastReport {
        let subscribers = self.topics.subscribers_of(topic).await;
        let mut report = BroadcastReport::default();

        for user_id in subscribers {
            let Some(handle) = self.registry.lookup(&user_id).await else {
                report.skipped += 1;
                continue;
            };

            match handle.send(payload.to_owned()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(user_id = %user_id, topic = %topic, error = %err, "Failed to send message to user");
                }
            }
        }

        debug!(
            topic = %topic,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "broadcast finished"
        );
        report
    }

    /// 点对点发送，唯一的接收者结果会回报给调用方
    pub async fn send_direct(&self, to: &UserId, payload: &str) -> Result<(), DirectSendError> {
        let handle = self
            .registry
            .lookup(to)
            .await
            .ok_or_else(|| DirectSendError::NotConnected(to.clone()))?;

        handle.send(payload.to_owned()).map_err(|err| {
            warn!(user_id = %to, error = %err, "Failed to send message to user");
            DirectSendError::from(err)
        })
    }

    pub async fn lookup(&self, user_id: &UserId) -> Option<SharedHandle> {
        self.registry.lookup(user_id).await
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.registry.lookup(user_id).await.is_some()
    }

    pub async fn subscribers_of(&self, topic: &Topic) -> Vec<UserId> {
        self.topics.subscribers_of(topic).await.into_iter().collect()
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            online_users: self.registry.len().await,
            topics: self.topics.topic_count().await,
        }
    }
}
