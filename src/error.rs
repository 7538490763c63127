//! PlateHub 错误处理系统
//!
//! 统一的错误类型和错误处理机制

use thiserror::Error;

/// 框架统一错误类型
#[derive(Error, Debug)]
pub enum HubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Hub 已经释放，不再分配任何资源
    #[error("Hub has been disposed")]
    Disposed,

    /// 消息标识不在目录中，通常意味着协议版本不一致
    #[error("Unknown message identifier: {code}")]
    UnknownMessage { code: u16 },

    #[error("Failed to construct plate {plate}: {message}")]
    PlateConstruction { plate: &'static str, message: String },

    #[error("Hardware error: {message}")]
    Hardware { message: String },

    #[error("Message channel closed")]
    ChannelClosed,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl HubError {
    /// 创建硬件相关错误
    pub fn hardware(message: &str) -> Self {
        Self::Hardware {
            message: message.to_string(),
        }
    }

    /// 创建配置相关错误
    pub fn config(message: &str) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// 创建插板构造错误
    pub fn plate_construction<T: ?Sized>(message: &str) -> Self {
        Self::PlateConstruction {
            plate: std::any::type_name::<T>(),
            message: message.to_string(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, HubError>;
