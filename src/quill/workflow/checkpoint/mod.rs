// SPDX-License-Identifier: MIT

//! Checkpoint persistence for suspended sessions
//!
//! The executor writes a checkpoint whenever a run stops at a suspend
//! point, and again when a resumed or cancelled session reaches a terminal
//! state. Stores only need to be safe for one writer per session.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kit::error::CheckpointError;
use crate::kit::step::InputRequest;
use crate::quill::workflow::state::WorkflowState;

/// Snapshot of a session paused at (or finished after) a suspend point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_key: String,
    /// The suspend-point step the session is waiting at
    pub step: String,
    pub request: InputRequest,
    pub state: WorkflowState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        session_key: impl Into<String>,
        step: impl Into<String>,
        request: InputRequest,
        state: WorkflowState,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            step: step.into(),
            request,
            state,
            saved_at: Utc::now(),
        }
    }

    /// Replace the stored state and refresh the timestamp
    pub fn with_state(mut self, state: WorkflowState) -> Self {
        self.state = state;
        self.saved_at = Utc::now();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or overwrite the checkpoint for `checkpoint.session_key`
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Fails with `CheckpointError::NotFound` for unknown sessions
    async fn load(&self, session_key: &str) -> Result<Checkpoint, CheckpointError>;

    /// Returns whether a checkpoint existed
    async fn delete(&self, session_key: &str) -> Result<bool, CheckpointError>;

    /// Stored session keys, sorted
    async fn list(&self) -> Result<Vec<String>, CheckpointError>;
}
