// SPDX-License-Identifier: MIT

//! Partial state updates returned by steps

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::{Cursor, Slot};

/// A sparse delta over `WorkflowState`.
///
/// Every scalar is optional and overrides the current value when present.
/// `errors` lists entries to append. `workflow_id` and `input_query` never
/// change after creation, so they have no field here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<Slot, Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// One error entry plus the `failed` marker
    pub fn failed(entry: impl Into<String>) -> Self {
        Self {
            current_step: Some(Cursor::Failed),
            errors: vec![entry.into()],
            ..Self::default()
        }
    }

    pub fn with_slot(mut self, slot: Slot, value: Value) -> Self {
        self.slots.insert(slot, value);
        self
    }

    pub fn with_error(mut self, entry: impl Into<String>) -> Self {
        self.errors.push(entry.into());
        self
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.current_step = Some(cursor);
        self
    }

    pub fn with_revision_count(mut self, count: u32) -> Self {
        self.revision_count = Some(count);
        self
    }

    pub fn with_selected_topic(mut self, topic: impl Into<String>) -> Self {
        self.selected_topic = Some(topic.into());
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_approval(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.current_step == Some(Cursor::Failed)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
