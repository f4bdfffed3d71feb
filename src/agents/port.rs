//! AgentPort：外部 Agent 能力的统一接口
//!
//! 给定 Prompt 与有序历史，返回文本（以及可选的附件）或失败。
//! 重试由实现方内部负责；调用方（状态机）不会对同一次调用重试。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::Message;

/// Agent 产出的附件（如 base64 编码的图表图片），对核心层不透明
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    /// base64 数据
    pub data: String,
    pub title: Option<String>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn to_markdown(&self) -> String {
        let title = self.title.as_deref().unwrap_or("attachment");
        let uri = format!("data:{};base64,{}", self.mime_type, self.data);
        if self.mime_type.starts_with("image/") {
            format!("![{title}]({uri})")
        } else {
            format!("[{title}]({uri})")
        }
    }
}

/// 一次 Agent 调用的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentOutput {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// 写入对话历史的内容：文本后依次追加附件
    pub fn render(&self) -> String {
        let mut content = self.text.clone();
        for attachment in &self.attachments {
            content.push_str("\n\n");
            content.push_str(&attachment.to_markdown());
        }
        content
    }
}

/// 外部 Agent 能力
#[async_trait]
pub trait AgentPort: Send + Sync {
    /// 用于日志
    fn name(&self) -> &str;

    /// 执行一次：`prompt` 为本次指令，`history` 为此前的有序消息
    async fn run(&self, prompt: &str, history: &[Message]) -> Result<AgentOutput, AgentError>;
}
