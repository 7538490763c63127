//! 消息层
//!
//! 消息目录、分发表和外部消息源接口

pub mod channel;
pub mod dispatcher;
pub mod message;

pub use channel::*;
pub use dispatcher::*;
pub use message::*;
