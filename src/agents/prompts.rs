//! 内置 Prompt
//!
//! 可由 `config/prompts/{name}.txt` 覆盖（见 `config::load_prompt_override`）。

use crate::config::load_prompt_override;
use crate::memory::{format_transcript, Message};

pub const ROUTER_SYSTEM_PROMPT: &str = "Your job is to route the user to the relevant agent.";

pub const ZERODHA_AGENT_SYSTEM_PROMPT: &str = "You are a trading assistant connected to the user's \
Zerodha account. Answer questions about holdings, positions, orders and margins, and help place \
or review trades. Be precise with numbers and never invent account data.";

pub const CHART_AGENT_SYSTEM_PROMPT: &str = "You are a charting assistant. Turn the portfolio and \
market data found in the conversation into a concise chart description or a chart image.";

pub const END_CONVERSATION_SYSTEM_PROMPT: &str =
    "You close the conversation with a clear, complete answer for the user.";

/// 读取覆盖文件，不存在则使用内置默认值
pub fn system_prompt(name: &str, default: &str) -> String {
    load_prompt_override(name).unwrap_or_else(|| default.to_string())
}

/// 路由 Prompt：完整对话 + 可选 Agent 列表，要求只输出一个名字
pub fn routing_prompt(messages: &[Message], agents: &str, terminal: &str) -> String {
    format!(
        "Conversation so far:\n{}\n\n\
         Available agents:\n{}\n\"{}\": the user's request is fully answered or no agent fits\n\n\
         Reply with exactly one agent name from the list above and nothing else.",
        format_transcript(messages),
        agents,
        terminal
    )
}

/// 总结 Prompt
pub fn summary_prompt(messages: &[Message]) -> String {
    format!(
        "Summarize the conversation and give the final output to the user.\n\n{}",
        format_transcript(messages)
    )
}
