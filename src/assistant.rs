//! 同步门面：把对话状态机挂在执行桥后面，供阻塞式前端（REPL / UI 事件处理）调用
//!
//! 前端只持有 conversation_id，历史始终从检查点存储读取；这里不保存任何对话状态。

use std::sync::Arc;

use anyhow::Context;

use crate::agents::prompts::{
    system_prompt, CHART_AGENT_SYSTEM_PROMPT, END_CONVERSATION_SYSTEM_PROMPT,
    ROUTER_SYSTEM_PROMPT, ZERODHA_AGENT_SYSTEM_PROMPT,
};
use crate::agents::{AgentPort, AgentRegistry, LlmAgent, RegistryError, TERMINAL_AGENT};
use crate::checkpoint::create_checkpoint_store;
use crate::config::{load_config, AppConfig};
use crate::core::{BridgeConfig, ExecutionBridge, FlowError};
use crate::flow::{AgenticFlow, RoutingPolicy, TurnOutcome};
use crate::llm::create_llm_from_config;
use crate::memory::Message;

/// 按配置组装状态机：LLM 后端、可路由 Agent、路由 / 总结 Agent、检查点存储
pub async fn build_flow(cfg: &AppConfig) -> Result<AgenticFlow, RegistryError> {
    let llm = create_llm_from_config(cfg);
    let agent = |name: &str, default_prompt: &str| -> Arc<dyn AgentPort> {
        Arc::new(
            LlmAgent::new(name, system_prompt(name, default_prompt), Arc::clone(&llm))
                .with_limits(&cfg.llm),
        )
    };

    let agents = AgentRegistry::builder()
        .register(
            "zerodha_agent",
            "trading, holdings, positions, orders and market data on the user's Zerodha account",
            agent("zerodha_agent", ZERODHA_AGENT_SYSTEM_PROMPT),
        )
        .register(
            "chart_agent",
            "turns portfolio or market data already in the conversation into a chart",
            agent("chart_agent", CHART_AGENT_SYSTEM_PROMPT),
        )
        .build()?;

    let router = RoutingPolicy::new(agent("router_agent", ROUTER_SYSTEM_PROMPT));
    let summarizer = agent(TERMINAL_AGENT, END_CONVERSATION_SYSTEM_PROMPT);
    let store = create_checkpoint_store(&cfg.checkpoint).await;

    Ok(AgenticFlow::new(router, agents, summarizer, store)
        .with_max_agent_hops(cfg.flow.max_agent_hops))
}

pub struct Assistant {
    flow: Arc<AgenticFlow>,
    bridge: ExecutionBridge,
}

impl Assistant {
    pub fn new(flow: AgenticFlow, bridge: ExecutionBridge) -> Self {
        Self {
            flow: Arc::new(flow),
            bridge,
        }
    }

    /// 加载配置文件（可选路径），失败时使用默认配置
    pub fn from_config_path(config_path: Option<std::path::PathBuf>) -> anyhow::Result<Self> {
        let cfg = load_config(config_path).unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            AppConfig::default()
        });
        Self::from_config(&cfg)
    }

    /// 在执行桥的 worker 上构建状态机，使存储连接池归属于同一个运行时
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let mut owned = cfg.clone();
        if owned.clamp_llm_timeout() {
            tracing::warn!(
                max_attempts = owned.llm.max_attempts,
                submit_timeout_secs = owned.bridge.submit_timeout_secs,
                "LLM request timeout {}s exceeds the bridge budget, using {}s",
                cfg.llm.timeouts.request,
                owned.llm.timeouts.request
            );
        }
        let bridge = ExecutionBridge::new(BridgeConfig::from(&owned.bridge));
        let flow = bridge
            .submit(async move { build_flow(&owned).await })
            .context("Failed to start execution bridge")?
            .context("Invalid agent registry")?;

        tracing::info!(
            app = %cfg.app.name,
            agents = flow.agents().len(),
            max_agent_hops = flow.max_agent_hops(),
            "Assistant ready"
        );
        Ok(Self::new(flow, bridge))
    }

    /// 处理一轮对话，阻塞当前线程直到完成或超时
    ///
    /// 同一 conversation_id 的调用须串行。
    pub fn handle_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, FlowError> {
        if user_text.trim().is_empty() {
            return Err(FlowError::EmptyInput);
        }
        let flow = Arc::clone(&self.flow);
        let id = conversation_id.to_string();
        let text = user_text.to_string();
        self.bridge
            .submit(async move { flow.handle_turn(&id, &text).await })?
    }

    /// 与 `handle_turn` 相同，但失败时返回展示给用户的错误文本
    pub fn reply(&self, conversation_id: &str, user_text: &str) -> String {
        match self.handle_turn(conversation_id, user_text) {
            Ok(outcome) => outcome.reply,
            Err(e) => {
                if !e.is_resumable() {
                    tracing::error!(conversation = conversation_id, "Turn failed: {}", e);
                } else {
                    tracing::warn!(conversation = conversation_id, "Turn failed: {}", e);
                }
                e.user_message()
            }
        }
    }

    pub fn history(&self, conversation_id: &str) -> Result<Vec<Message>, FlowError> {
        let flow = Arc::clone(&self.flow);
        let id = conversation_id.to_string();
        self.bridge.submit(async move { flow.history(&id).await })?
    }

    pub fn conversations(&self) -> Result<Vec<String>, FlowError> {
        let flow = Arc::clone(&self.flow);
        self.bridge.submit(async move { flow.conversations().await })?
    }

    /// 停止后台 worker（有界等待）；之后的调用会重新启动 worker
    pub fn shutdown(&self) {
        self.bridge.cleanup();
    }
}
