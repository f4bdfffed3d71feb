//! Investica - 多 Agent 投资助手的对话编排核心
//!
//! 模块划分：
//! - **agents**: AgentPort 接口、基于 LLM 的 Agent、注册表与内置 Prompt
//! - **assistant**: 同步门面（执行桥 + 状态机），供 REPL / UI 调用
//! - **checkpoint**: 按 conversation_id 保存对话快照（内存 / SQLite）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与同步 / 异步执行桥
//! - **flow**: 对话状态、路由策略与状态机
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息
//! - **observability**: 日志初始化

pub mod agents;
pub mod assistant;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod flow;
pub mod llm;
pub mod memory;
pub mod observability;

pub use assistant::Assistant;
pub use core::{ExecutionBridge, FlowError};
pub use flow::{AgenticFlow, TurnOutcome};
