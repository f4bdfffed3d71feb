//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `INVESTICA__*` 覆盖（双下划线表示嵌套，如 `INVESTICA__FLOW__MAX_AGENT_HOPS=4`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub flow: FlowSection,
    pub bridge: BridgeSection,
    pub llm: LlmSection,
    pub checkpoint: CheckpointSection,
}

impl AppConfig {
    /// 单次 Agent 调用的最坏耗时（max_attempts × request）须短于 submit_timeout；
    /// 超出时收紧 request 并返回 true
    pub fn clamp_llm_timeout(&mut self) -> bool {
        let attempts = u64::from(self.llm.max_attempts.max(1));
        let submit = self.bridge.submit_timeout_secs;
        if attempts * self.llm.timeouts.request < submit {
            return false;
        }
        self.llm.timeouts.request = (submit.saturating_sub(1) / attempts).max(1);
        true
    }
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Investica".to_string(),
        }
    }
}

/// [flow] 段：状态机参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowSection {
    /// 单次 handle_turn 内 Routing → Executing 的最大次数，超过后强制进入总结
    pub max_agent_hops: usize,
}

impl Default for FlowSection {
    fn default() -> Self {
        Self { max_agent_hops: 8 }
    }
}

/// [bridge] 段：执行桥超时（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub submit_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            submit_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

/// [llm] 段：后端选择、重试与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 每个 Agent 调用的最大尝试次数（Agent 内部重试预算）
    pub max_attempts: u32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_attempts: 2,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 12 }
    }
}

/// [checkpoint] 段：检查点存储后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointSection {
    /// memory / sqlite（sqlite 需要 async-sqlite feature）
    pub backend: String,
    pub db_path: PathBuf,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            db_path: PathBuf::from("data/checkpoints.db"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 INVESTICA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 INVESTICA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("INVESTICA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 读取 Prompt 覆盖文件（config/prompts/<name>.txt），不存在时返回 None
pub fn load_prompt_override(name: &str) -> Option<String> {
    [
        format!("config/prompts/{name}.txt"),
        format!("../config/prompts/{name}.txt"),
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}
