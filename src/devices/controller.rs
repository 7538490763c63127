//! GPIO 控制器访问器
//!
//! Hub 构造时打开唯一的控制器，拆除时释放一次。

use crate::hardware::{GpioController, HardwareProvider};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// GPIO 控制器访问器
pub struct GpioControllerAccessor {
    controller: Arc<dyn GpioController>,
    released: AtomicBool,
}

impl GpioControllerAccessor {
    /// 立即打开控制器
    pub fn open(provider: &dyn HardwareProvider) -> Result<Self> {
        let controller = provider.open_controller()?;
        debug!("GPIO controller opened");
        Ok(Self {
            controller,
            released: AtomicBool::new(false),
        })
    }

    /// 共享控制器实例
    pub fn get(&self) -> Arc<dyn GpioController> {
        self.controller.clone()
    }

    /// 释放控制器，返回本次调用是否执行了释放
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.controller.release();
        info!("GPIO controller released");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedHardware;

    #[test]
    fn test_same_instance_and_single_release() {
        let hardware = SimulatedHardware::new();
        let accessor = GpioControllerAccessor::open(&hardware).unwrap();

        assert!(Arc::ptr_eq(&accessor.get(), &accessor.get()));
        assert!(accessor.release());
        assert!(!accessor.release());
        assert_eq!(hardware.controllers()[0].release_count(), 1);
        assert_eq!(hardware.stats().controllers_opened, 1);
    }

    #[test]
    fn test_open_failure_propagates() {
        let hardware = SimulatedHardware::new();
        hardware.fail_controller(true);
        assert!(GpioControllerAccessor::open(&hardware).is_err());
    }
}
