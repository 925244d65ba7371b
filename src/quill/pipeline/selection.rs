// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};

use super::USER_SELECTION;
use crate::kit::error::StepError;
use crate::kit::step::{HumanInput, InputKind, InputRequest, Step};
use crate::quill::workflow::state::{Slot, StateUpdate, WorkflowState};

/// Pauses for the human to pick one of the scored topics
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectionStep;

impl SelectionStep {
    fn scored_topics(state: &WorkflowState) -> Result<&Vec<Value>, StepError> {
        match state.get_slot(Slot::ScoredTopics).and_then(Value::as_array) {
            Some(topics) if !topics.is_empty() => Ok(topics),
            _ => Err(StepError::missing_field(
                Slot::ScoredTopics.as_str(),
                "No scored_topics found in state for user selection",
            )),
        }
    }
}

#[async_trait]
impl Step for SelectionStep {
    fn name(&self) -> &str {
        USER_SELECTION
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        Self::scored_topics(state)?;
        Err(StepError::invalid("Topic selection requires human input"))
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        let topics = Self::scored_topics(state)?;
        log::info!(
            "[{}] Prompting user to select from {} topics",
            state.workflow_id,
            topics.len()
        );
        Ok(Some(InputRequest::new(
            InputKind::TopicSelection,
            "Please select a topic",
            json!({ "topics": topics }),
        )))
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        let topics = Self::scored_topics(state)?;
        let HumanInput::Selection { index } = *input else {
            return Err(StepError::invalid("Expected a topic selection"));
        };
        if index < 1 || index > topics.len() {
            return Err(StepError::invalid(format!(
                "Invalid selection: {} (choose 1-{})",
                index,
                topics.len()
            )));
        }

        let topic = topics[index - 1]
            .get("topic")
            .and_then(Value::as_str)
            .filter(|topic| !topic.trim().is_empty())
            .ok_or_else(|| StepError::invalid("Selected topic data is missing 'topic' field"))?;

        log::info!(
            "[{}] User selected topic: '{}' (index {})",
            state.workflow_id,
            topic,
            index
        );
        Ok(StateUpdate::new().with_selected_topic(topic))
    }
}
