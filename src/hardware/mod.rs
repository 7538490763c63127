//! 硬件协作接口层
//!
//! GPIO 控制器、I2C 设备以及打开它们的硬件提供者。
//! 具体的引脚驱动和 I2C 传输由外部实现，Hub 只负责它们的生命周期。

pub mod simulated;

pub use simulated::*;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// GPIO 引脚编号（逻辑编号）
pub type PinNumber = u32;

/// I2C 设备地址
pub type I2cAddress = u16;

/// 引脚模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinMode {
    Input,
    InputPullUp,
    InputPullDown,
    Output,
}

/// 引脚电平
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinValue {
    Low,
    High,
}

impl From<bool> for PinValue {
    fn from(high: bool) -> Self {
        if high {
            PinValue::High
        } else {
            PinValue::Low
        }
    }
}

/// I2C 连接参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct I2cConnectionSettings {
    /// 总线编号
    pub bus_id: u32,
    /// 设备地址
    pub device_address: I2cAddress,
}

impl I2cConnectionSettings {
    pub fn new(bus_id: u32, device_address: I2cAddress) -> Self {
        Self {
            bus_id,
            device_address,
        }
    }
}

impl fmt::Display for I2cConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i2c-{}@{:#04x}", self.bus_id, self.device_address)
    }
}

/// GPIO 控制器
///
/// 整个 Hub 生命周期内只存在一个实例，由所有插板共享。
pub trait GpioController: Send + Sync {
    /// 以指定模式打开引脚
    fn open_pin(&self, pin: PinNumber, mode: PinMode) -> Result<()>;

    /// 关闭引脚
    fn close_pin(&self, pin: PinNumber) -> Result<()>;

    /// 引脚是否已打开
    fn is_pin_open(&self, pin: PinNumber) -> bool;

    /// 写引脚电平
    fn write(&self, pin: PinNumber, value: PinValue) -> Result<()>;

    /// 读引脚电平
    fn read(&self, pin: PinNumber) -> Result<PinValue>;

    /// 释放控制器，只由 Hub 在拆除时调用
    fn release(&self);
}

/// I2C 设备句柄
///
/// 同一地址的句柄在所有插板之间共享，只由 Hub 在拆除时释放。
pub trait I2cDevice: Send + Sync {
    /// 连接参数
    fn connection_settings(&self) -> I2cConnectionSettings;

    /// 写数据
    fn write(&self, data: &[u8]) -> Result<()>;

    /// 读数据
    fn read(&self, buffer: &mut [u8]) -> Result<()>;

    /// 先写后读（重复起始条件）
    fn write_read(&self, data: &[u8], buffer: &mut [u8]) -> Result<()>;

    /// 释放设备
    fn release(&self);
}

/// 硬件提供者 - 打开控制器和 I2C 设备的外部实现
#[cfg_attr(test, mockall::automock)]
pub trait HardwareProvider: Send + Sync {
    /// 打开 GPIO 控制器
    fn open_controller(&self) -> Result<Arc<dyn GpioController>>;

    /// 打开 I2C 设备
    fn open_i2c_device(&self, settings: I2cConnectionSettings) -> Result<Arc<dyn I2cDevice>>;
}

/// GPIO 控制器工厂 - 插板通过它获取共享控制器
pub trait GpioControllerFactory {
    fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>>;
}

/// I2C 设备工厂 - 插板通过它获取共享设备句柄
pub trait I2cDeviceFactory {
    fn get_or_create_i2c_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>>;
}
