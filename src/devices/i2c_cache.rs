//! I2C 设备缓存
//!
//! 地址到设备句柄的映射。首次请求时打开设备，之后所有插板共享同一句柄，
//! 句柄只在 Hub 拆除时统一释放。

use crate::hardware::{HardwareProvider, I2cAddress, I2cConnectionSettings, I2cDevice};
use crate::slot::SlotMap;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// I2C 设备缓存
pub struct I2cDeviceCache {
    /// 总线编号
    bus_id: u32,
    /// 硬件提供者
    provider: Arc<dyn HardwareProvider>,
    /// 按地址缓存的设备；打开失败的地址不留条目
    devices: SlotMap<I2cAddress, Arc<dyn I2cDevice>>,
    released: AtomicBool,
}

impl I2cDeviceCache {
    pub fn new(bus_id: u32, provider: Arc<dyn HardwareProvider>) -> Self {
        Self {
            bus_id,
            provider,
            devices: SlotMap::new(),
            released: AtomicBool::new(false),
        }
    }

    pub fn bus_id(&self) -> u32 {
        self.bus_id
    }

    /// 获取或创建设备句柄
    ///
    /// 同一地址的并发请求只会打开一次设备，其余调用者拿到同一句柄。
    /// 打开失败直接返回给调用者，缓存中不留条目，下次请求会重试。
    pub fn get_or_create(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        self.devices.get_or_try_init(address, || {
            let settings = I2cConnectionSettings::new(self.bus_id, address);
            debug!("Opening I2C device {}", settings);
            self.provider.open_i2c_device(settings).map_err(|e| {
                warn!("Failed to open I2C device {}: {}", settings, e);
                e
            })
        })
    }

    /// 已缓存的设备（不创建）
    pub fn get(&self, address: I2cAddress) -> Option<Arc<dyn I2cDevice>> {
        self.devices.get(&address)
    }

    /// 已打开的设备数量
    pub fn len(&self) -> usize {
        self.devices.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 释放全部设备，返回释放数量。重复调用不会再次释放。
    pub fn release_all(&self) -> usize {
        if self.released.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let devices = self.devices.values();
        self.devices.clear();

        for device in &devices {
            device.release();
        }
        let released = devices.len();

        info!("Released {} I2C devices on bus {}", released, self.bus_id);
        released
    }
}
