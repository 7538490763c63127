//! 插板核心特征定义
//!
//! 插板是构建在 Hub 共享总线和引脚之上的扩展模块。每个插板持有一个
//! `PlateLifecycle`，释放时依次执行插板自身的清理和所有已登记的回调。

use crate::hub::HubHandle;
use crate::Result;
use parking_lot::Mutex;
use std::any::Any;

/// 释放回调
pub type DisposalCallback = Box<dyn FnOnce() + Send>;

/// 插板生命周期
///
/// 释放只会发生一次；释放之后登记的回调会被立即执行。
pub struct PlateLifecycle {
    /// `None` 表示已经释放
    callbacks: Mutex<Option<Vec<DisposalCallback>>>,
}

impl PlateLifecycle {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Some(Vec::new())),
        }
    }

    /// 登记释放回调
    pub fn register_for_disposal(&self, callback: DisposalCallback) {
        let mut guard = self.callbacks.lock();
        match guard.as_mut() {
            Some(callbacks) => callbacks.push(callback),
            None => {
                drop(guard);
                callback();
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.callbacks.lock().is_none()
    }

    /// 标记为已释放并取出回调；已经释放过时返回 `None`
    fn begin_disposal(&self) -> Option<Vec<DisposalCallback>> {
        self.callbacks.lock().take()
    }
}

impl Default for PlateLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlateLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlateLifecycle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// 核心插板特征 - 所有插板必须实现
pub trait Plate: Any + Send + Sync {
    /// 构造插板。`hub` 是指向 Hub 的非拥有引用，用于申请总线和引脚。
    fn create(hub: HubHandle) -> Result<Self>
    where
        Self: Sized;

    /// 插板的生命周期
    fn lifecycle(&self) -> &PlateLifecycle;

    /// 插板自身的清理逻辑
    fn release(&self) {}

    /// 释放插板
    ///
    /// 只有第一次调用生效：先执行 `release`，再执行所有释放回调。
    fn dispose(&self) {
        if let Some(callbacks) = self.lifecycle().begin_disposal() {
            self.release();
            for callback in callbacks {
                callback();
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.lifecycle().is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_callbacks_run_once() {
        let lifecycle = PlateLifecycle::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            lifecycle.register_for_disposal(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let callbacks = lifecycle.begin_disposal().unwrap();
        assert!(lifecycle.begin_disposal().is_none());
        for callback in callbacks {
            callback();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(lifecycle.is_disposed());
    }

    #[test]
    fn test_late_registration_runs_immediately() {
        let lifecycle = PlateLifecycle::new();
        lifecycle.begin_disposal();

        let counter = Arc::new(AtomicUsize::new(0));
        let observed = counter.clone();
        lifecycle.register_for_disposal(Box::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
