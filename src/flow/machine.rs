//! 对话状态机
//!
//! 一轮（handle_turn）的流程：
//! Routing → Executing(agent) → Routing → … → Summarizing → Done
//!
//! - 路由返回终止、路由失败或超出跳数上限时进入 Summarizing
//! - 每次改变状态后立即写检查点；中途崩溃最多丢失正在进行的那一步
//! - 单个 Agent 失败被转换为一条可见的 assistant 消息，对话仍可继续
//! - 只有检查点存储失败会让本轮失败

use std::sync::Arc;

use crate::agents::prompts::summary_prompt;
use crate::agents::{AgentId, AgentPort, AgentRegistry, TERMINAL_AGENT};
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::core::{AgentError, FlowError};
use crate::flow::{ConversationState, FlowPhase, RoutingDecision, RoutingPolicy};
use crate::memory::Message;

/// 一轮处理的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// 展示给用户的回复（历史中的最后一条消息）
    pub reply: String,
    /// 本轮 Routing → Executing 的次数
    pub hops: usize,
    /// 是否因跳数上限被强制终止
    pub forced_termination: bool,
    /// 本轮追加的消息数（含用户消息）
    pub messages_appended: usize,
}

pub struct AgenticFlow {
    router: RoutingPolicy,
    agents: AgentRegistry,
    summarizer: Arc<dyn AgentPort>,
    store: Arc<dyn CheckpointStore>,
    max_agent_hops: usize,
}

impl AgenticFlow {
    pub fn new(
        router: RoutingPolicy,
        agents: AgentRegistry,
        summarizer: Arc<dyn AgentPort>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            router,
            agents,
            summarizer,
            store,
            max_agent_hops: 8,
        }
    }

    pub fn with_max_agent_hops(mut self, max_agent_hops: usize) -> Self {
        self.max_agent_hops = max_agent_hops;
        self
    }

    pub fn max_agent_hops(&self) -> usize {
        self.max_agent_hops
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// 处理一条用户输入，返回本轮的最终回复
    ///
    /// 同一 conversation_id 的调用须由调用方串行化；不同 id 可并发。
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, FlowError> {
        if user_text.trim().is_empty() {
            return Err(FlowError::EmptyInput);
        }

        let mut record = self.store.load(conversation_id).await?;
        let start_len = record.state.len();

        record.state.append(Message::user(user_text));
        self.checkpoint(&mut record).await?;

        let mut phase = FlowPhase::Routing;
        let mut hops = 0usize;
        let mut forced_termination = false;

        loop {
            tracing::debug!(conversation = conversation_id, ?phase, hops, "Flow transition");
            phase = match phase {
                FlowPhase::Routing => {
                    if hops >= self.max_agent_hops {
                        tracing::warn!(
                            conversation = conversation_id,
                            hops,
                            "Agent hop limit reached, forcing summary"
                        );
                        forced_termination = true;
                        FlowPhase::Summarizing
                    } else {
                        self.route(&record.state).await
                    }
                }
                FlowPhase::Executing(agent) => {
                    hops += 1;
                    let content = self.execute(&agent, &record.state).await;
                    record.state.append(Message::assistant(content));
                    self.checkpoint(&mut record).await?;
                    FlowPhase::Routing
                }
                FlowPhase::Summarizing => {
                    let content = self.summarize(&record.state).await;
                    record.state.append(Message::assistant(content));
                    self.checkpoint(&mut record).await?;
                    FlowPhase::Done
                }
                FlowPhase::Done => break,
            };
        }

        let reply = record
            .state
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        tracing::info!(
            conversation = conversation_id,
            hops,
            step = record.step,
            "Turn completed"
        );

        Ok(TurnOutcome {
            reply,
            hops,
            forced_termination,
            messages_appended: record.state.len() - start_len,
        })
    }

    /// 读取某个对话的完整历史（新对话为空）
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>, FlowError> {
        let record = self.store.load(conversation_id).await?;
        Ok(record.state.messages().to_vec())
    }

    /// 已有检查点的对话 ID
    pub async fn conversations(&self) -> Result<Vec<String>, FlowError> {
        Ok(self.store.list_conversations().await?)
    }

    async fn route(&self, state: &ConversationState) -> FlowPhase {
        match self.router.decide(state, &self.agents).await {
            Ok(RoutingDecision::Agent(agent)) => FlowPhase::Executing(agent),
            Ok(RoutingDecision::Terminal) => FlowPhase::Summarizing,
            Err(e) => {
                tracing::warn!(
                    conversation = state.conversation_id(),
                    "Routing failed, forcing summary: {}",
                    e
                );
                FlowPhase::Summarizing
            }
        }
    }

    /// 调用选中的 Agent：prompt 为最后一条消息，history 为之前的消息
    async fn execute(&self, agent: &AgentId, state: &ConversationState) -> String {
        let Some(port) = self.agents.port(agent) else {
            return FlowError::AgentExecutionFailed {
                agent: agent.to_string(),
                source: AgentError::LlmError("agent not registered".to_string()),
            }
            .user_message();
        };

        let (prompt, history) = match state.messages().split_last() {
            Some((last, earlier)) => (last.content.as_str(), earlier),
            None => ("", state.messages()),
        };

        tracing::info!(
            conversation = state.conversation_id(),
            agent = %agent,
            "Executing agent"
        );

        match port.run(prompt, history).await {
            Ok(output) => output.render(),
            Err(source) => {
                let err = FlowError::AgentExecutionFailed {
                    agent: agent.to_string(),
                    source,
                };
                tracing::warn!(conversation = state.conversation_id(), "{}", err);
                err.user_message()
            }
        }
    }

    async fn summarize(&self, state: &ConversationState) -> String {
        let prompt = summary_prompt(state.messages());
        match self.summarizer.run(&prompt, &[]).await {
            Ok(output) => output.render(),
            Err(source) => {
                let err = FlowError::AgentExecutionFailed {
                    agent: TERMINAL_AGENT.to_string(),
                    source,
                };
                tracing::warn!(conversation = state.conversation_id(), "{}", err);
                err.user_message()
            }
        }
    }

    async fn checkpoint(&self, record: &mut CheckpointRecord) -> Result<(), FlowError> {
        record.advance();
        self.store.save(record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::agents::{FailingAgent, ScriptedAgent};
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::memory::Role;

    struct Fixture {
        flow: AgenticFlow,
        router: Arc<ScriptedAgent>,
        zerodha: Arc<ScriptedAgent>,
        summarizer: Arc<ScriptedAgent>,
        store: Arc<MemoryCheckpointStore>,
    }

    fn fixture(router_script: Vec<&str>) -> Fixture {
        let router = Arc::new(ScriptedAgent::new("router", router_script));
        let zerodha = Arc::new(ScriptedAgent::always("zerodha_agent", "Holdings: INFY x10"));
        let summarizer = Arc::new(ScriptedAgent::always("end_conversation_agent", "Summary"));
        let store = Arc::new(MemoryCheckpointStore::new());

        let agents = AgentRegistry::builder()
            .register("zerodha_agent", "trading", zerodha.clone())
            .build()
            .unwrap();
        let flow = AgenticFlow::new(
            RoutingPolicy::new(router.clone()),
            agents,
            summarizer.clone(),
            store.clone(),
        );

        Fixture {
            flow,
            router,
            zerodha,
            summarizer,
            store,
        }
    }

    #[tokio::test]
    async fn test_terminal_routing_summarizes_single_message() {
        let f = fixture(vec!["end_conversation_agent"]);

        let outcome = f.flow.handle_turn("a", "hello").await.unwrap();
        assert_eq!(outcome.reply, "Summary");
        assert_eq!(outcome.hops, 0);
        assert_eq!(outcome.messages_appended, 2);
        assert_eq!(f.zerodha.calls(), 0);

        // 总结 Prompt 只包含这一条用户消息
        let prompt = &f.summarizer.prompts()[0];
        assert!(prompt.ends_with("user: hello"));

        let history = f.flow.history("a").await.unwrap();
        assert_eq!(history, vec![Message::user("hello"), Message::assistant("Summary")]);
    }

    #[tokio::test]
    async fn test_one_agent_then_terminal_appends_three_messages() {
        let f = fixture(vec!["zerodha_agent", "end_conversation_agent"]);

        let outcome = f.flow.handle_turn("b", "show my holdings").await.unwrap();
        assert_eq!(outcome.hops, 1);
        assert!(!outcome.forced_termination);

        let history = f.flow.history("b").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], Message::user("show my holdings"));
        assert_eq!(history[1], Message::assistant("Holdings: INFY x10"));
        assert_eq!(history[2], Message::assistant("Summary"));

        // Agent 收到最后一条消息作为 prompt，之前的消息作为历史
        assert_eq!(f.zerodha.prompts(), vec!["show my holdings"]);
        assert!(f.zerodha.histories()[0].is_empty());
    }

    #[tokio::test]
    async fn test_every_transition_is_checkpointed() {
        let f = fixture(vec!["zerodha_agent", "end_conversation_agent"]);
        f.flow.handle_turn("b", "hi").await.unwrap();

        // 用户消息、Agent 回复、总结各保存一次
        let record = f.store.load("b").await.unwrap();
        assert_eq!(record.step, 3);
    }

    #[tokio::test]
    async fn test_router_that_never_terminates_is_cut_off() {
        let f = fixture(vec!["zerodha_agent"]);
        let flow = f.flow.with_max_agent_hops(3);

        let outcome = flow.handle_turn("loop", "go").await.unwrap();
        assert_eq!(outcome.hops, 3);
        assert!(outcome.forced_termination);
        assert_eq!(outcome.reply, "Summary");
        assert_eq!(f.zerodha.calls(), 3);
        assert_eq!(f.router.calls(), 3);
        // 用户 + 3 次 Agent 回复 + 总结
        assert_eq!(outcome.messages_appended, 5);
    }

    #[tokio::test]
    async fn test_routing_failure_forces_summary() {
        let agents = AgentRegistry::builder()
            .register("zerodha_agent", "", Arc::new(ScriptedAgent::always("z", "x")))
            .build()
            .unwrap();
        let flow = AgenticFlow::new(
            RoutingPolicy::new(Arc::new(FailingAgent::new(
                "router",
                AgentError::LlmError("unreachable".into()),
            ))),
            agents,
            Arc::new(ScriptedAgent::always("end", "Summary")),
            Arc::new(MemoryCheckpointStore::new()),
        );

        let outcome = flow.handle_turn("c", "hi").await.unwrap();
        assert_eq!(outcome.reply, "Summary");
        assert_eq!(outcome.hops, 0);
    }

    #[tokio::test]
    async fn test_agent_failure_becomes_visible_message() {
        let agents = AgentRegistry::builder()
            .register(
                "zerodha_agent",
                "",
                Arc::new(FailingAgent::new(
                    "zerodha_agent",
                    AgentError::Timeout(Duration::from_secs(60)),
                )),
            )
            .build()
            .unwrap();
        let flow = AgenticFlow::new(
            RoutingPolicy::new(Arc::new(ScriptedAgent::new(
                "router",
                vec!["zerodha_agent", "end_conversation_agent"],
            ))),
            agents,
            Arc::new(ScriptedAgent::always("end", "Summary")),
            Arc::new(MemoryCheckpointStore::new()),
        );

        let outcome = flow.handle_turn("d", "buy").await.unwrap();
        assert_eq!(outcome.reply, "Summary");

        let history = flow.history("d").await.unwrap();
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[1].content.starts_with("I encountered an error"));
        assert!(history[1].content.contains("zerodha_agent"));

        // 下一轮仍可继续
        assert!(flow.handle_turn("d", "again").await.is_ok());
    }

    #[tokio::test]
    async fn test_summarizer_failure_becomes_last_message() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let flow = AgenticFlow::new(
            RoutingPolicy::new(Arc::new(ScriptedAgent::always("router", "end_conversation_agent"))),
            AgentRegistry::builder().build().unwrap(),
            Arc::new(FailingAgent::new(
                "end_conversation_agent",
                AgentError::LlmError("provider down".into()),
            )),
            store.clone(),
        );

        let outcome = flow.handle_turn("s", "wrap up").await.unwrap();
        assert!(outcome.reply.starts_with("I encountered an error"));
        assert!(outcome.reply.contains("end_conversation_agent"));
        assert_eq!(outcome.messages_appended, 2);

        let record = store.load("s").await.unwrap();
        assert_eq!(record.step, 2);
        assert_eq!(
            record.state.last_message(),
            Some(&Message::assistant(outcome.reply.clone()))
        );
    }

    #[tokio::test]
    async fn test_empty_input_rejected_without_writes() {
        let f = fixture(vec!["end_conversation_agent"]);
        let err = f.flow.handle_turn("e", "   ").await.unwrap_err();
        assert!(matches!(err, FlowError::EmptyInput));
        assert!(f.store.is_empty().await);
        assert_eq!(f.router.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_turn_sees_first_turn_history() {
        let f = fixture(vec!["end_conversation_agent"]);
        f.flow.handle_turn("a", "first").await.unwrap();
        f.flow.handle_turn("a", "second").await.unwrap();

        let history = f.flow.history("a").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "Summary", "second", "Summary"]);
        assert_eq!(f.flow.conversations().await.unwrap(), vec!["a".to_string()]);
    }
}
