// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::kit::error::StepError;
use crate::kit::step::Step;
use crate::quill::workflow::state::{StateUpdate, WorkflowState};

/// Revision bookkeeping around the revise body.
///
/// The body produces the revised content; this adapter bumps
/// `revision_count`, never past `max_revisions`.
pub struct RevisionStep<S> {
    inner: S,
}

impl<S: Step> RevisionStep<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: Step> Step for RevisionStep<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        if state.feedback.as_deref().map_or(true, |f| f.trim().is_empty()) {
            return Err(StepError::missing_field(
                "feedback",
                "feedback is required and cannot be empty",
            ));
        }

        let update = self.inner.execute(state).await?;
        let count = (state.revision_count + 1).min(state.max_revisions);
        log::info!(
            "[{}] Revision {}/{} applied",
            state.workflow_id,
            count,
            state.max_revisions
        );
        Ok(update.with_revision_count(count))
    }
}
