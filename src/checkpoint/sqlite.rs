//! SQLite 检查点存储（需要 `async-sqlite` feature）
//!
//! 使用 sqlx 提供异步读写；每个 conversation_id 一行，`INSERT OR REPLACE` 覆盖写入。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{CheckpointError, CheckpointRecord, CheckpointStore};
use crate::flow::ConversationState;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// 打开（必要时创建）数据库文件并初始化表
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                conversation_id TEXT PRIMARY KEY,
                step INTEGER NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<CheckpointRecord, CheckpointError> {
        let row = sqlx::query(
            "SELECT step, state, updated_at FROM checkpoints WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(CheckpointRecord::fresh(conversation_id));
        };

        let step: i64 = row.get("step");
        let state_json: String = row.get("state");
        let updated_at: String = row.get("updated_at");

        let state: ConversationState = serde_json::from_str(&state_json)?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))?
            .with_timezone(&Utc);

        Ok(CheckpointRecord {
            state,
            step: step as u64,
            updated_at,
        })
    }

    async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        let state_json = serde_json::to_string(&record.state)?;

        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (conversation_id, step, state, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(record.conversation_id())
        .bind(record.step as i64)
        .bind(&state_json)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<String>, CheckpointError> {
        let rows = sqlx::query("SELECT conversation_id FROM checkpoints ORDER BY conversation_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("conversation_id")).collect())
    }
}
