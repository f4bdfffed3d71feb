//! Agent 层：AgentPort 接口、LLM 实现、注册表与内置 Prompt

pub mod llm_agent;
pub mod mock;
pub mod port;
pub mod prompts;
pub mod registry;

pub use llm_agent::LlmAgent;
pub use mock::{FailingAgent, ScriptedAgent};
pub use port::{AgentOutput, AgentPort, Attachment};
pub use registry::{AgentId, AgentRegistry, AgentRegistryBuilder, RegistryError, TERMINAL_AGENT};
