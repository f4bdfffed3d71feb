//! 核心层：错误分类与同步 / 异步执行桥

pub mod bridge;
pub mod error;

pub use bridge::{BridgeConfig, BridgeError, ExecutionBridge};
pub use error::{AgentError, FlowError};
