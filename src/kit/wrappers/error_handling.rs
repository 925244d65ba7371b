// SPDX-License-Identifier: MIT

use crate::kit::error::StepError;
use crate::kit::step::{HumanInput, InputRequest, Step};
use crate::quill::workflow::state::{StateUpdate, WorkflowState};
use async_trait::async_trait;

/// Build the update that records a step failure: one error entry and the
/// `failed` terminal marker.
pub fn failure_update(step: &str, workflow_id: &str, err: &StepError) -> StateUpdate {
    let entry = err.to_entry(step);
    log::error!("[{}] {}", workflow_id, entry);
    StateUpdate::failed(entry)
}

/// Never lets a `StepError` escape: failures become state updates
pub struct ErrorHandled<S> {
    inner: S,
}

impl<S: Step> ErrorHandled<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn settle(
        &self,
        state: &WorkflowState,
        result: Result<StateUpdate, StepError>,
    ) -> StateUpdate {
        match result {
            Ok(update) => update,
            Err(err) => failure_update(self.inner.name(), &state.workflow_id, &err),
        }
    }
}

#[async_trait]
impl<S: Step> Step for ErrorHandled<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        let result = self.inner.execute(state).await;
        Ok(self.settle(state, result))
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        self.inner.input_request(state)
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        let result = self.inner.resume(state, input).await;
        Ok(self.settle(state, result))
    }
}
