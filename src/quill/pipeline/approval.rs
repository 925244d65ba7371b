// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};

use super::USER_APPROVAL;
use crate::kit::error::StepError;
use crate::kit::step::{ApprovalDecision, HumanInput, InputKind, InputRequest, Step};
use crate::quill::workflow::state::{Slot, StateUpdate, WorkflowState};

/// Pauses for the human to approve the reviewed article or ask for a
/// revision.
///
/// Once `revision_count` reaches `max_revisions` no input is requested:
/// `execute` approves automatically and clamps the count, and `resume`
/// does the same whatever decision it is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApprovalStep;

impl ApprovalStep {
    /// At the revision cap the outcome is approve, whatever was decided
    fn forced_approval(state: &WorkflowState) -> StateUpdate {
        log::warn!(
            "[{}] Maximum revisions ({}) reached. Auto-approving article.",
            state.workflow_id,
            state.max_revisions
        );
        StateUpdate::new()
            .with_approval(true)
            .with_revision_count(state.revision_count.min(state.max_revisions))
    }

    fn reviewed_article(state: &WorkflowState) -> Result<&Value, StepError> {
        state.require_slot(Slot::ReviewedArticle).map_err(|_| {
            StepError::missing_field(
                Slot::ReviewedArticle.as_str(),
                "No reviewed_article found in state for user approval",
            )
        })
    }
}

#[async_trait]
impl Step for ApprovalStep {
    fn name(&self) -> &str {
        USER_APPROVAL
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        Self::reviewed_article(state)?;
        if !state.revisions_exhausted() {
            return Err(StepError::invalid("Article approval requires human input"));
        }
        Ok(Self::forced_approval(state))
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        let article = Self::reviewed_article(state)?;
        if state.revisions_exhausted() {
            return Ok(None);
        }

        log::info!(
            "[{}] Prompting user to approve article (revision {}/{})",
            state.workflow_id,
            state.revision_count,
            state.max_revisions
        );
        Ok(Some(InputRequest::new(
            InputKind::ArticleApproval,
            "Please approve or request revision",
            json!({
                "article": article,
                "revision_count": state.revision_count,
                "max_revisions": state.max_revisions,
            }),
        )))
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        Self::reviewed_article(state)?;
        if state.revisions_exhausted() {
            return Ok(Self::forced_approval(state));
        }
        match input {
            HumanInput::Decision {
                decision: ApprovalDecision::Approve,
                ..
            } => {
                log::info!(
                    "[{}] User approved article for publication",
                    state.workflow_id
                );
                Ok(StateUpdate::new().with_approval(true))
            }
            HumanInput::Decision {
                decision: ApprovalDecision::Revise,
                feedback,
            } => {
                let feedback = feedback
                    .as_deref()
                    .map(str::trim)
                    .filter(|feedback| !feedback.is_empty())
                    .ok_or_else(|| {
                        StepError::missing_field("feedback", "Revision feedback cannot be empty")
                    })?;
                log::info!(
                    "[{}] User requested revision. Feedback: {}",
                    state.workflow_id,
                    feedback.chars().take(100).collect::<String>()
                );
                Ok(StateUpdate::new()
                    .with_approval(false)
                    .with_feedback(feedback))
            }
            HumanInput::Selection { .. } => {
                Err(StepError::invalid("Invalid approval decision: selection"))
            }
        }
    }
}
