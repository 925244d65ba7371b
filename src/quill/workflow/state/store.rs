// SPDX-License-Identifier: MIT

//! The workflow state document

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::{Cursor, Slot};
use super::update::StateUpdate;
use crate::kit::error::{StateError, StepError};

/// Single mutable document threaded through every step of one workflow
/// instance. The engine owns it; steps only see `&WorkflowState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Correlation id for logging and checkpoint lookup
    pub workflow_id: String,
    /// Seed request that started the workflow
    pub input_query: String,
    pub current_step: Cursor,
    pub revision_count: u32,
    pub max_revisions: u32,
    /// Append-only
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub retry_count: u32,

    // Human decisions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,

    /// Stage outputs
    #[serde(default)]
    pub slots: BTreeMap<Slot, Value>,
}

impl WorkflowState {
    /// Create the initial document with required fields only
    pub fn new(
        workflow_id: impl AsRef<str>,
        input_query: impl AsRef<str>,
        max_revisions: u32,
    ) -> Result<Self, StateError> {
        let workflow_id = workflow_id.as_ref().trim();
        let input_query = input_query.as_ref().trim();

        if workflow_id.is_empty() {
            return Err(StateError::EmptyField("workflow_id"));
        }
        if input_query.is_empty() {
            return Err(StateError::EmptyField("input_query"));
        }
        if max_revisions < 1 {
            return Err(StateError::InvalidMaxRevisions(max_revisions));
        }

        Ok(Self {
            workflow_id: workflow_id.to_string(),
            input_query: input_query.to_string(),
            current_step: Cursor::Pending,
            revision_count: 0,
            max_revisions,
            errors: Vec::new(),
            retry_count: 0,
            selected_topic: None,
            feedback: None,
            approved: None,
            slots: BTreeMap::new(),
        })
    }

    /// Create the initial document with a fresh UUID as workflow id
    pub fn start(input_query: impl AsRef<str>, max_revisions: u32) -> Result<Self, StateError> {
        Self::new(uuid::Uuid::new_v4().to_string(), input_query, max_revisions)
    }

    /// Merge a partial update: scalars and slots override, errors append
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            current_step,
            revision_count,
            retry_count,
            errors,
            selected_topic,
            feedback,
            approved,
            slots,
        } = update;

        if let Some(cursor) = current_step {
            self.current_step = cursor;
        }
        if let Some(count) = revision_count {
            self.revision_count = count;
        }
        if let Some(count) = retry_count {
            self.retry_count = count;
        }
        self.errors.extend(errors);
        if selected_topic.is_some() {
            self.selected_topic = selected_topic;
        }
        if feedback.is_some() {
            self.feedback = feedback;
        }
        if approved.is_some() {
            self.approved = approved;
        }
        self.slots.extend(slots);
    }

    /// Check required fields and the revision invariant
    pub fn validate(&self) -> Result<(), StateError> {
        if self.workflow_id.trim().is_empty() {
            return Err(StateError::EmptyField("workflow_id"));
        }
        if self.input_query.trim().is_empty() {
            return Err(StateError::EmptyField("input_query"));
        }
        self.validate_revision_count()
    }

    pub fn validate_revision_count(&self) -> Result<(), StateError> {
        if self.max_revisions < 1 {
            return Err(StateError::InvalidMaxRevisions(self.max_revisions));
        }
        if self.revision_count > self.max_revisions {
            return Err(StateError::RevisionOverflow {
                count: self.revision_count,
                max: self.max_revisions,
            });
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current_step.is_terminal()
    }

    pub fn revisions_exhausted(&self) -> bool {
        self.revision_count >= self.max_revisions
    }

    pub fn get_slot(&self, slot: Slot) -> Option<&Value> {
        self.slots.get(&slot)
    }

    pub fn has_slot(&self, slot: Slot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Fetch a slot a step depends on, or fail with a validation error
    pub fn require_slot(&self, slot: Slot) -> Result<&Value, StepError> {
        match self.slots.get(&slot) {
            Some(Value::Null) | None => Err(StepError::missing_field(
                slot.as_str(),
                format!("No {} found in state", slot),
            )),
            Some(value) => Ok(value),
        }
    }

    /// Get a nested slot value using dot notation (e.g., "outline.title")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let slot = Slot::ALL.into_iter().find(|s| s.as_str() == head)?;

        let mut current = self.slots.get(&slot)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
