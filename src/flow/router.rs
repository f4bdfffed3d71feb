//! 路由策略：把当前对话状态映射为下一个 Agent 或终止
//!
//! 路由 Agent 的输出是自由文本，这里严格按注册表校验；任何不在集合内的输出都视为终止。

use std::sync::Arc;

use crate::agents::prompts::routing_prompt;
use crate::agents::{AgentId, AgentPort, AgentRegistry, TERMINAL_AGENT};
use crate::core::FlowError;
use crate::flow::ConversationState;

/// 路由结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    Agent(AgentId),
    Terminal,
}

pub struct RoutingPolicy {
    port: Arc<dyn AgentPort>,
}

impl RoutingPolicy {
    pub fn new(port: Arc<dyn AgentPort>) -> Self {
        Self { port }
    }

    /// 除路由 Agent 调用外无副作用；相同状态与相同 Agent 输出得到相同结果
    pub async fn decide(
        &self,
        state: &ConversationState,
        agents: &AgentRegistry,
    ) -> Result<RoutingDecision, FlowError> {
        let prompt = routing_prompt(state.messages(), &agents.describe(), TERMINAL_AGENT);
        let output = self
            .port
            .run(&prompt, &[])
            .await
            .map_err(|e| FlowError::RoutingFailed(e.to_string()))?;

        Ok(Self::interpret(&output.text, agents))
    }

    fn interpret(raw: &str, agents: &AgentRegistry) -> RoutingDecision {
        match agents.resolve(raw) {
            Some(id) => RoutingDecision::Agent(id),
            None => {
                if raw.trim() != TERMINAL_AGENT {
                    tracing::debug!("Router output {:?} is not a known agent, terminating", raw);
                }
                RoutingDecision::Terminal
            }
        }
    }
}
