//! PlateHub - 单板计算机扩展插板的硬件访问中枢
//!
//! 把数字引脚、I2C 总线和一组物理按键统一放在一个协调对象之后
//!
//! # 架构分层
//!
//! - **插板层**: 按类型懒加载、唯一实例、释放时自动注销的插板注册表
//! - **设备层**: 按地址缓存的 I2C 设备句柄和唯一的 GPIO 控制器
//! - **消息层**: 订阅外部消息通道，按静态分发表更新按键状态
//! - **Hub**: 组合以上组件，持有它们的生命周期并按固定顺序拆除
//!
//! # 示例
//!
//! ```no_run
//! use plate_hub::{Hub, LocalChannel, SimulatedHardware};
//! use std::sync::Arc;
//!
//! let hub = Hub::with_defaults(
//!     Arc::new(SimulatedHardware::new()),
//!     Arc::new(LocalChannel::new()),
//! )?;
//! let device = hub.get_or_create_device(0x3c)?;
//! println!("{:?}", device.connection_settings());
//! hub.dispose();
//! # Ok::<(), plate_hub::HubError>(())
//! ```

pub mod buttons;
pub mod config;
pub mod devices;
pub mod error;
pub mod hardware;
pub mod hub;
pub mod messaging;
pub mod plates;
mod slot;

// 重新导出核心类型
pub use buttons::*;
pub use config::*;
pub use devices::*;
pub use error::*;
pub use hardware::*;
pub use hub::*;
pub use messaging::*;
pub use plates::*;

/// 框架信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FRAMEWORK_NAME: &str = "PlateHub";
