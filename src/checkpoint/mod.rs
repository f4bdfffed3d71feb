//! 检查点存储抽象层
//!
//! 以 conversation_id 为键保存对话状态的最新快照，支持内存和持久化两种实现。
//! 每个 conversation_id 只有一条有效记录，写入按键“后写者胜”；不同键之间可安全并发读写。

pub mod memory;
#[cfg(feature = "async-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CheckpointSection;
use crate::flow::ConversationState;

pub use memory::MemoryCheckpointStore;
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteCheckpointStore;

/// 检查点存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Corrupt(err.to_string())
    }
}

#[cfg(feature = "async-sqlite")]
impl From<sqlx::Error> for CheckpointError {
    fn from(err: sqlx::Error) -> Self {
        CheckpointError::Unavailable(err.to_string())
    }
}

/// 某个对话的最新快照 + 内部步数
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub state: ConversationState,
    /// 每次保存递增；新对话为 0
    pub step: u64,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// 新对话的空记录
    pub fn fresh(conversation_id: &str) -> Self {
        Self {
            state: ConversationState::new(conversation_id),
            step: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        self.state.conversation_id()
    }

    /// 推进步数并刷新时间戳（保存前调用）
    pub fn advance(&mut self) {
        self.step += 1;
        self.updated_at = Utc::now();
    }
}

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取最新记录；不存在时返回空的新记录
    async fn load(&self, conversation_id: &str) -> Result<CheckpointRecord, CheckpointError>;

    /// 覆盖写入该对话的记录
    async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError>;

    /// 已保存的对话 ID
    async fn list_conversations(&self) -> Result<Vec<String>, CheckpointError>;
}

/// 创建检查点存储
///
/// backend = "sqlite" 且启用了 async-sqlite feature 时使用 SQLite；否则使用内存存储
pub async fn create_checkpoint_store(section: &CheckpointSection) -> Arc<dyn CheckpointStore> {
    if section.backend.eq_ignore_ascii_case("sqlite") {
        #[cfg(feature = "async-sqlite")]
        match SqliteCheckpointStore::new(&section.db_path).await {
            Ok(store) => {
                tracing::info!("Using SQLite checkpoint store: {:?}", section.db_path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite checkpoint store, falling back to memory: {}", e);
            }
        }

        #[cfg(not(feature = "async-sqlite"))]
        tracing::warn!("SQLite checkpoint store requested but async-sqlite feature not enabled, using memory store");
    }

    tracing::info!("Using in-memory checkpoint store");
    Arc::new(MemoryCheckpointStore::new())
}
