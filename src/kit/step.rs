// SPDX-License-Identifier: MIT

use crate::kit::error::StepError;
use crate::quill::workflow::state::{StateUpdate, WorkflowState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named unit of work in a workflow.
///
/// A step receives a read-only snapshot of the workflow state and returns a
/// sparse `StateUpdate`; the engine owns the canonical state and merges the
/// update. Steps may await I/O but never share mutable state with each other.
///
/// Steps registered as suspend points additionally implement
/// `input_request` and `resume`: the engine asks for a request first, and
/// when one is returned it hands control back to the caller instead of
/// calling `execute`. The caller's decision later arrives through `resume`.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used for registry lookup, logging and error attribution
    fn name(&self) -> &str;

    /// Run the step body
    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError>;

    /// Describe the human input this step needs, if any.
    ///
    /// `Ok(None)` means the step can run without input right now and the
    /// engine will call `execute`.
    fn input_request(&self, _state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        Ok(None)
    }

    /// Continue the step with an externally supplied decision
    async fn resume(
        &self,
        _state: &WorkflowState,
        _input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        Err(StepError::invalid(format!(
            "Step '{}' does not accept human input",
            self.name()
        )))
    }
}

#[async_trait]
impl<T: Step + ?Sized> Step for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        (**self).execute(state).await
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        (**self).input_request(state)
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        (**self).resume(state, input).await
    }
}

/// What kind of decision a suspended step is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    TopicSelection,
    ArticleApproval,
}

/// Structured payload handed to the caller at a suspend point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    pub kind: InputKind,
    pub message: String,
    /// Data the caller needs to decide (candidate topics, the article, ...)
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl InputRequest {
    pub fn new(kind: InputKind, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            message: message.into(),
            payload,
        }
    }
}

/// Approve the reviewed article or send it back for revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Revise,
}

/// A decision supplied from outside the engine to resume a suspended step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HumanInput {
    /// 1-based index into the presented candidates
    Selection { index: usize },
    Decision {
        decision: ApprovalDecision,
        #[serde(default)]
        feedback: Option<String>,
    },
}

impl HumanInput {
    pub fn select(index: usize) -> Self {
        Self::Selection { index }
    }

    pub fn approve() -> Self {
        Self::Decision {
            decision: ApprovalDecision::Approve,
            feedback: None,
        }
    }

    pub fn revise(feedback: impl Into<String>) -> Self {
        Self::Decision {
            decision: ApprovalDecision::Revise,
            feedback: Some(feedback.into()),
        }
    }

    /// The request kind this input answers
    pub fn kind(&self) -> InputKind {
        match self {
            HumanInput::Selection { .. } => InputKind::TopicSelection,
            HumanInput::Decision { .. } => InputKind::ArticleApproval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct PlainStep;

    #[async_trait]
    impl Step for PlainStep {
        fn name(&self) -> &str {
            "plain"
        }

        async fn execute(&self, _state: &WorkflowState) -> Result<StateUpdate, StepError> {
            Ok(StateUpdate::default())
        }
    }

    #[tokio::test]
    async fn test_default_step_needs_no_input() {
        let state = WorkflowState::new("wf-1", "rust", 3).unwrap();
        assert!(PlainStep.input_request(&state).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_resume_rejects_input() {
        let state = WorkflowState::new("wf-1", "rust", 3).unwrap();
        let err = PlainStep
            .resume(&state, &HumanInput::approve())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("does not accept human input"));
    }

    #[tokio::test]
    async fn test_arc_forwards_to_inner() {
        let step: Arc<dyn Step> = Arc::new(PlainStep);
        let state = WorkflowState::new("wf-1", "rust", 3).unwrap();
        assert_eq!(Step::name(&step), "plain");
        assert!(step.execute(&state).await.unwrap().is_empty());
    }

    #[test]
    fn test_input_kind() {
        assert_eq!(HumanInput::select(1).kind(), InputKind::TopicSelection);
        assert_eq!(HumanInput::approve().kind(), InputKind::ArticleApproval);
    }

    #[test]
    fn test_human_input_json_shape() {
        let input: HumanInput = serde_json::from_value(json!({
            "type": "decision",
            "decision": "revise",
            "feedback": "shorter"
        }))
        .unwrap();
        assert_eq!(input, HumanInput::revise("shorter"));

        let input: HumanInput =
            serde_json::from_value(json!({"type": "selection", "index": 2})).unwrap();
        assert_eq!(input, HumanInput::select(2));

        let input: HumanInput =
            serde_json::from_value(json!({"type": "decision", "decision": "approve"})).unwrap();
        assert_eq!(input, HumanInput::approve());
    }
}
