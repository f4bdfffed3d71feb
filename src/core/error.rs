//! 错误类型
//!
//! - `AgentError`：单次 AgentPort 调用失败（已耗尽其内部重试）
//! - `FlowError`：一轮对话（handle_turn）对调用方可见的错误
//!
//! 可恢复的错误（路由失败、单个 Agent 失败）在状态机内部被吸收为一条可见的 assistant 消息；
//! 只有检查点存储不可用会让本轮失败。

use std::time::Duration;

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::core::bridge::BridgeError;

/// AgentPort 调用失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("agent returned an empty response")]
    EmptyOutput,
}

/// 一轮对话的错误分类
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("empty input")]
    EmptyInput,

    /// 路由 Agent 不可达或输出无效；状态机会强制走终止路径，通常不会传到调用方
    #[error("routing failed: {0}")]
    RoutingFailed(String),

    #[error("agent '{agent}' failed: {source}")]
    AgentExecutionFailed {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("checkpoint store unavailable: {0}")]
    CheckpointUnavailable(#[from] CheckpointError),

    #[error("no reply within {0:?}")]
    BridgeTimeout(Duration),

    #[error("background execution failed: {0}")]
    BridgeFailed(String),

    #[error("execution worker stopped before replying")]
    BridgeStopped,
}

impl From<BridgeError> for FlowError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TimedOut(d) => FlowError::BridgeTimeout(d),
            BridgeError::Failed(msg) => FlowError::BridgeFailed(msg),
            BridgeError::Stopped => FlowError::BridgeStopped,
        }
    }
}

impl FlowError {
    /// 渲染为展示给用户的文本（调用方永远拿到文本，而不是未处理的故障）
    pub fn user_message(&self) -> String {
        match self {
            FlowError::EmptyInput => "Please enter a message or command.".to_string(),
            FlowError::CheckpointUnavailable(_) => format!(
                "I encountered an error: {self}. This conversation could not be saved; please start a new one."
            ),
            FlowError::BridgeTimeout(d) => format!(
                "I encountered an error: the request took longer than {}s. It may still finish in the background; please try again shortly.",
                d.as_secs()
            ),
            _ => format!("I encountered an error: {self}"),
        }
    }

    /// 本轮失败后该对话是否还能继续使用
    pub fn is_resumable(&self) -> bool {
        !matches!(self, FlowError::CheckpointUnavailable(_))
    }
}
