//! 主题订阅索引
//!
//! 主题名到订阅者集合的映射。空集合与不存在的主题等价。

use std::collections::{HashMap, HashSet};

use domain::{Topic, UserId};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct TopicIndex {
    topics: RwLock<HashMap<Topic, HashSet<UserId>>>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅主题，重复订阅没有额外效果
    ///
    /// 返回值表示订阅关系是否发生了变化。
    pub async fn subscribe(&self, user_id: UserId, topic: Topic) -> bool {
        let mut topics = self.topics.write().await;
        topics.entry(topic).or_default().insert(user_id)
    }

    /// 取消订阅；集合变空时保留主题条目
    pub async fn unsubscribe(&self, user_id: &UserId, topic: &Topic) -> bool {
        let mut topics = self.topics.write().await;
        topics
            .get_mut(topic)
            .map(|subscribers| subscribers.remove(user_id))
            .unwrap_or(false)
    }

    /// 把用户从所有主题中移除，返回受影响的主题数
    ///
    /// 因此变空的主题会被一并删除。
    pub async fn unsubscribe_all(&self, user_id: &UserId) -> usize {
        let mut topics = self.topics.write().await;
        let mut removed = 0;
        topics.retain(|_, subscribers| {
            if subscribers.remove(user_id) {
                removed += 1;
            }
            !subscribers.is_empty()
        });
        removed
    }

    /// 某一时刻订阅者集合的快照
    pub async fn subscribers_of(&self, topic: &Topic) -> HashSet<UserId> {
        let topics = self.topics.read().await;
        topics.get(topic).cloned().unwrap_or_default()
    }

    /// 至少有一个订阅者的主题数
    pub async fn topic_count(&self) -> usize {
        let topics = self.topics.read().await;
        topics.values().filter(|subscribers| !subscribers.is_empty()).count()
    }
}
