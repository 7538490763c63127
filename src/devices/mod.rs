//! 共享设备资源
//!
//! I2C 设备缓存和 GPIO 控制器访问器

pub mod controller;
pub mod i2c_cache;

pub use controller::*;
pub use i2c_cache::*;
