//! 插板层
//!
//! 插板特征、生命周期和按类型的插板注册表

pub mod plate;
pub mod registry;

pub use self::plate::*;
pub use self::registry::*;
