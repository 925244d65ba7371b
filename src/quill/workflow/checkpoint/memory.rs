// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore};
use crate::kit::error::CheckpointError;

/// Process-local store; contents are lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.session_key.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, session_key: &str) -> Result<Checkpoint, CheckpointError> {
        self.checkpoints
            .read()
            .await
            .get(session_key)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(session_key.to_string()))
    }

    async fn delete(&self, session_key: &str) -> Result<bool, CheckpointError> {
        Ok(self.checkpoints.write().await.remove(session_key).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut keys: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
