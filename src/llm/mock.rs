//! Mock LLM 客户端（无需 API Key）
//!
//! 回显最后一条 User 消息，便于本地跑通路由 → 总结流程。
//! 路由 Prompt 的回显不会匹配任何 Agent 名称，因此 Mock 下每轮都直接进入总结。

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let messages = vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        let out = MockLlmClient.complete(&messages).await.unwrap();
        assert_eq!(out, "Echo from Mock: second");
    }
}
