//! 基于 LlmClient 的 Agent：system prompt + 历史 + 本次指令，带超时与有限次重试

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agents::{AgentOutput, AgentPort};
use crate::config::LlmSection;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

pub struct LlmAgent {
    name: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
    max_attempts: u32,
    request_timeout: Duration,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            llm,
            max_attempts: 2,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// 按 [llm] 段设置重试次数与单次超时
    pub fn with_limits(mut self, section: &LlmSection) -> Self {
        self.max_attempts = section.max_attempts.max(1);
        self.request_timeout = Duration::from_secs(section.timeouts.request);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn build_messages(&self, prompt: &str, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(Message::user(prompt));
        messages
    }
}

#[async_trait]
impl AgentPort for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str, history: &[Message]) -> Result<AgentOutput, AgentError> {
        let messages = self.build_messages(prompt, history);
        let mut last_err = AgentError::EmptyOutput;

        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.request_timeout, self.llm.complete(&messages)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(AgentOutput::text(text)),
                Ok(Ok(_)) => last_err = AgentError::EmptyOutput,
                Ok(Err(e)) => last_err = AgentError::LlmError(e),
                Err(_) => last_err = AgentError::Timeout(self.request_timeout),
            }
            tracing::warn!(
                agent = %self.name,
                attempt,
                max_attempts = self.max_attempts,
                "Agent call failed: {}",
                last_err
            );
        }

        Err(last_err)
    }
}
