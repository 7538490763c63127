//! 消息通道
//!
//! `MessageSource` 是外部发布/订阅传输的接口；`LocalChannel` 是进程内实现，
//! 可以同步发布，也可以通过 tokio 后台任务从 mpsc 队列泵送消息。

use super::dispatcher::DispatchOutcome;
use super::message::Message;
use crate::{HubError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 订阅标识
pub type SubscriptionId = Uuid;

/// 订阅回调
pub type MessageCallback = Arc<dyn Fn(&Message) -> Result<DispatchOutcome> + Send + Sync>;

/// 外部消息源
pub trait MessageSource: Send + Sync {
    /// 订阅通知
    fn subscribe(&self, callback: MessageCallback) -> Result<SubscriptionId>;

    /// 取消订阅，返回订阅是否存在。
    ///
    /// 返回后不会再开始对该回调的新调用；回调内部也可以安全地调用本方法。
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// 关闭通道
    fn close(&self);
}

/// 通道统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// 已注册的订阅
struct Subscriber {
    callback: MessageCallback,
    /// 取消订阅或关闭通道时清除
    active: AtomicBool,
}

impl Subscriber {
    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// 进程内消息通道
#[derive(Default)]
pub struct LocalChannel {
    subscribers: RwLock<HashMap<SubscriptionId, Arc<Subscriber>>>,
    closed: AtomicBool,
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// 同步发布消息，返回成功处理的订阅者数量
    ///
    /// 订阅者返回的错误（例如未知标识）记入统计并以 error 级别记录。
    pub fn publish(&self, message: &Message) -> Result<usize> {
        if self.is_closed() {
            return Err(HubError::ChannelClosed);
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        // 投递前释放读锁，回调中可以订阅、取消订阅或拆除 Hub
        let subscribers: Vec<(SubscriptionId, Arc<Subscriber>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, subscriber)| (*id, subscriber.clone()))
            .collect();

        let mut delivered = 0;
        for (id, subscriber) in subscribers {
            if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            match (subscriber.callback)(message) {
                Ok(outcome) => {
                    delivered += 1;
                    debug!("Subscriber {} handled message {}: {:?}", id, message.code, outcome);
                }
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    error!("Subscriber {} failed on message {}: {}", id, message.code, e);
                }
            }
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        Ok(delivered)
    }

    /// 启动后台泵送任务
    ///
    /// 发送端全部丢弃或通道关闭后任务结束。需要在 tokio 运行时中调用。
    pub fn spawn_pump(self: &Arc<Self>) -> (mpsc::UnboundedSender<Message>, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
        let channel = Arc::clone(self);

        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                if let Err(e) = channel.publish(&message) {
                    warn!("Dropping message {}: {}", message.code, e);
                    break;
                }
            }
            debug!("Message pump stopped");
        });

        (sender, handle)
    }
}

impl MessageSource for LocalChannel {
    fn subscribe(&self, callback: MessageCallback) -> Result<SubscriptionId> {
        if self.is_closed() {
            return Err(HubError::ChannelClosed);
        }

        let id = Uuid::new_v4();
        self.subscribers.write().insert(
            id,
            Arc::new(Subscriber {
                callback,
                active: AtomicBool::new(true),
            }),
        );
        debug!("Registered subscriber {}", id);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.deactivate();
                debug!("Removed subscriber {}", id);
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let drained: Vec<Arc<Subscriber>> =
                self.subscribers.write().drain().map(|(_, s)| s).collect();
            for subscriber in drained {
                subscriber.deactivate();
            }
            info!("Local message channel closed");
        }
    }
}
