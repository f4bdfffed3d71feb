//! 内存检查点存储（进程生命周期内有效）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CheckpointError, CheckpointRecord, CheckpointStore};

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: RwLock<HashMap<String, CheckpointRecord>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<CheckpointRecord, CheckpointError> {
        Ok(self
            .records
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| CheckpointRecord::fresh(conversation_id)))
    }

    async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        self.records
            .write()
            .await
            .insert(record.conversation_id().to_string(), record.clone());
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
