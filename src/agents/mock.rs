//! 测试用 Agent：按脚本回放结果，便于驱动状态机的各条路径

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::agents::{AgentOutput, AgentPort};
use crate::core::AgentError;
use crate::memory::Message;

/// 依次返回脚本中的结果，脚本耗尽后重复最后一项；记录调用次数与收到的 Prompt
pub struct ScriptedAgent {
    name: String,
    script: Mutex<VecDeque<Result<String, AgentError>>>,
    last: Mutex<Result<String, AgentError>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    histories: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, script: Vec<&str>) -> Self {
        Self::with_results(name, script.into_iter().map(|s| Ok(s.to_string())).collect())
    }

    pub fn always(name: impl Into<String>, reply: &str) -> Self {
        Self::new(name, vec![reply])
    }

    pub fn with_results(name: impl Into<String>, script: Vec<Result<String, AgentError>>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script.into()),
            last: Mutex::new(Err(AgentError::EmptyOutput)),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            histories: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// 每次调用前等待，用于超时 / 并发测试
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn next_result(&self) -> Result<String, AgentError> {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(result) = next {
            *last = result;
        }
        last.clone()
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str, history: &[Message]) -> Result<AgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Ok(mut histories) = self.histories.lock() {
            histories.push(history.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_result().map(AgentOutput::text)
    }
}

/// 永远失败的 Agent
pub struct FailingAgent {
    name: String,
    error: AgentError,
}

impl FailingAgent {
    pub fn new(name: impl Into<String>, error: AgentError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

#[async_trait]
impl AgentPort for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _prompt: &str, _history: &[Message]) -> Result<AgentOutput, AgentError> {
        Err(self.error.clone())
    }
}
