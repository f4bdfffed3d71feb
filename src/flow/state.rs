//! 对话状态与状态机阶段

use serde::{Deserialize, Serialize};

use crate::agents::AgentId;
use crate::memory::Message;

/// 单个对话的持久状态；`messages` 只追加
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    conversation_id: String,
    messages: Vec<Message>,
}

impl ConversationState {
    /// 新对话：空历史
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 仅状态机在一轮处理中调用
    pub(crate) fn append(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// 一轮处理中的状态机阶段
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowPhase {
    Routing,
    Executing(AgentId),
    Summarizing,
    Done,
}
