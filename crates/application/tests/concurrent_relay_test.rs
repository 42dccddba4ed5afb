//! 并发中继测试
//!
//! 使用基于通道的句柄模拟真实连接，验证并发连接、订阅与广播下的数据一致性。

use std::sync::Arc;
use std::time::Duration;

use application::{Relay, RelayPolicy};
use domain::{CloseReason, ConnectionHandle, ConnectionId, DeliveryError, Topic, UserId};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// 测试用连接：把推送的帧写进有界通道
struct ChannelHandle {
    connection_id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ChannelHandle {
    fn pair(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Arc::new(Self {
            connection_id: ConnectionId::new(),
            tx,
        });
        (handle, rx)
    }
}

impl ConnectionHandle for ChannelHandle {
    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn send(&self, payload: String) -> Result<(), DeliveryError> {
        self.tx.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self, _reason: CloseReason) {}
}

fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

fn topic(name: &str) -> Topic {
    Topic::parse(name).unwrap()
}

/// 订阅者 A 收到一次广播，未订阅的 C 什么也收不到
#[tokio::test]
async fn test_broadcast_scenario() {
    let relay = Relay::default();
    let (alice, mut alice_rx) = ChannelHandle::pair(8);
    let (bob, _bob_rx) = ChannelHandle::pair(8);
    let (carol, mut carol_rx) = ChannelHandle::pair(8);

    relay.connect(user("alice"), alice).await.unwrap();
    relay.connect(user("bob"), bob).await.unwrap();
    relay.connect(user("carol"), carol).await.unwrap();
    relay.subscribe(user("alice"), topic("general")).await;

    let report = relay.broadcast(&topic("general"), "hi").await;
    assert_eq!(report.delivered, 1);

    assert_eq!(alice_rx.try_recv().unwrap(), "hi");
    assert!(alice_rx.try_recv().is_err());
    assert!(carol_rx.try_recv().is_err());
}

/// 接收方的通道已关闭或已满，都只影响它自己
#[tokio::test]
async fn test_broadcast_survives_dead_and_slow_recipients() {
    let relay = Relay::default();
    let (alive, mut alive_rx) = ChannelHandle::pair(8);
    let (dead, dead_rx) = ChannelHandle::pair(8);
    let (slow, _slow_rx) = ChannelHandle::pair(1);
    drop(dead_rx);

    relay.connect(user("alive"), alive).await.unwrap();
    relay.connect(user("dead"), dead).await.unwrap();
    relay.connect(user("slow"), slow.clone()).await.unwrap();
    slow.send("backlog".to_string()).unwrap();

    for name in ["alive", "dead", "slow"] {
        relay.subscribe(user(name), topic("general")).await;
    }

    let report = relay.broadcast(&topic("general"), "hi").await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(alive_rx.recv().await.unwrap(), "hi");
}

/// 按顺序执行连接/断开，查询结果总是最近一次未被注销的连接
#[tokio::test]
async fn test_lookup_tracks_latest_connection() {
    let relay = Relay::default();

    for round in 0..10 {
        let (handle, _rx) = ChannelHandle::pair(1);
        let connection_id = handle.connection_id();
        relay.connect(user("alice"), handle).await.unwrap();

        let current = relay.lookup(&user("alice")).await.map(|h| h.connection_id());
        assert_eq!(current, Some(connection_id));

        if round % 3 == 2 {
            relay.disconnect(&user("alice")).await;
            assert!(relay.lookup(&user("alice")).await.is_none());
        }
    }
}

/// 并发连接、订阅和广播不会丢失成员，也不会死锁
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connect_subscribe_broadcast() {
    let relay = Arc::new(Relay::new(RelayPolicy::default()));
    let mut receivers = Vec::new();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let relay = relay.clone();
            let (handle, rx) = ChannelHandle::pair(64);
            receivers.push(rx);
            tokio::spawn(async move {
                sleep(Duration::from_millis(i as u64 % 5)).await;
                let id = user(&format!("user-{i}"));
                relay.connect(id.clone(), handle).await.unwrap();
                relay.subscribe(id, topic("general")).await;
            })
        })
        .collect();

    let broadcaster = {
        let relay = relay.clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                relay.broadcast(&topic("general"), "tick").await;
                sleep(Duration::from_millis(1)).await;
            }
        })
    };

    for task in tasks {
        task.await.unwrap();
    }
    broadcaster.await.unwrap();

    let stats = relay.stats().await;
    assert_eq!(stats.online_users, 20);
    assert_eq!(relay.subscribers_of(&topic("general")).await.len(), 20);

    let report = relay.broadcast(&topic("general"), "final").await;
    assert_eq!(report.delivered, 20);

    for mut rx in receivers {
        let mut last = None;
        while let Ok(frame) = rx.try_recv() {
            last = Some(frame);
        }
        assert_eq!(last.as_deref(), Some("final"));
    }
}

/// 旧连接注销与同一用户的重连、重新订阅交错执行，新订阅始终保留
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_during_release_keeps_new_subscription() {
    for round in 0..64 {
        let relay = Arc::new(Relay::default());
        let (old, _old_rx) = ChannelHandle::pair(8);
        let old_id = old.connection_id();
        relay.connect(user("alice"), old).await.unwrap();
        relay.subscribe(user("alice"), topic("general")).await;

        let releasing = {
            let relay = relay.clone();
            tokio::spawn(async move {
                for _ in 0..round {
                    tokio::task::yield_now().await;
                }
                relay.release(&user("alice"), old_id).await
            })
        };

        let reconnecting = {
            let relay = relay.clone();
            tokio::spawn(async move {
                while relay.is_online(&user("alice")).await {
                    tokio::task::yield_now().await;
                }
                let (new, new_rx) = ChannelHandle::pair(8);
                relay.connect(user("alice"), new).await.unwrap();
                relay.subscribe(user("alice"), topic("general")).await;
                new_rx
            })
        };

        assert!(releasing.await.unwrap());
        let mut new_rx = reconnecting.await.unwrap();

        assert_eq!(
            relay.subscribers_of(&topic("general")).await,
            vec![user("alice")],
            "round {round}"
        );
        let report = relay.broadcast(&topic("general"), "hi").await;
        assert_eq!(report.delivered, 1, "round {round}");
        assert_eq!(new_rx.recv().await.unwrap(), "hi");
    }
}
