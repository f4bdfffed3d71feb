//! Agent 注册表：可路由 Agent 的封闭集合
//!
//! 构建后不可变。`AgentId` 只能通过 `resolve` 获得，因此持有 `AgentId` 即意味着它属于该集合。

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::agents::AgentPort;

/// 路由 Agent 用来表示“结束对话”的标识，不允许被注册为普通 Agent
pub const TERMINAL_AGENT: &str = "end_conversation_agent";

/// 已注册的 Agent 标识
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AgentId(String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' is reserved for the terminal decision")]
    Reserved(String),
    #[error("agent '{0}' registered twice")]
    Duplicate(String),
    #[error("invalid agent name '{0}': must be non-empty without whitespace")]
    InvalidName(String),
}

struct RegisteredAgent {
    id: AgentId,
    description: String,
    port: Arc<dyn AgentPort>,
}

/// 可路由 Agent 的封闭集合（按注册顺序）
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// 将路由输出映射为已注册 Agent；仅去掉首尾空白，其余必须逐字符（区分大小写）匹配
    pub fn resolve(&self, raw: &str) -> Option<AgentId> {
        let candidate = raw.trim();
        self.agents
            .iter()
            .find(|a| a.id.as_str() == candidate)
            .map(|a| a.id.clone())
    }

    pub fn port(&self, id: &AgentId) -> Option<Arc<dyn AgentPort>> {
        self.agents
            .iter()
            .find(|a| &a.id == id)
            .map(|a| Arc::clone(&a.port))
    }

    /// 路由 Prompt 中的 Agent 列表
    pub fn describe(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("\"{}\": {}", a.id, a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<(String, String, Arc<dyn AgentPort>)>,
}

impl AgentRegistryBuilder {
    pub fn register(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        port: Arc<dyn AgentPort>,
    ) -> Self {
        self.agents.push((name.into(), description.into(), port));
        self
    }

    pub fn build(self) -> Result<AgentRegistry, RegistryError> {
        let mut agents: Vec<RegisteredAgent> = Vec::with_capacity(self.agents.len());
        for (name, description, port) in self.agents {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidName(name));
            }
            if name == TERMINAL_AGENT {
                return Err(RegistryError::Reserved(name));
            }
            if agents.iter().any(|a| a.id.as_str() == name) {
                return Err(RegistryError::Duplicate(name));
            }
            agents.push(RegisteredAgent {
                id: AgentId(name),
                description,
                port,
            });
        }
        Ok(AgentRegistry { agents })
    }
}
