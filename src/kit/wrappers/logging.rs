// SPDX-License-Identifier: MIT

use super::StepFuture;
use crate::kit::error::StepError;
use crate::kit::events::{EventKind, EventSink, StepEvent};
use crate::kit::step::{HumanInput, InputRequest, Step};
use crate::quill::workflow::state::{StateUpdate, WorkflowState};
use async_trait::async_trait;
use log::Level;
use std::sync::Arc;
use std::time::Instant;

/// Records start, completion and failure of every invocation.
///
/// Purely observational: results pass through untouched, and each call is
/// logged on its own, so retried or repeated invocations are safe.
pub struct Logged<S> {
    inner: S,
    sink: Arc<dyn EventSink>,
}

impl<S: Step> Logged<S> {
    pub fn new(inner: S, sink: Arc<dyn EventSink>) -> Self {
        Self { inner, sink }
    }

    async fn observe<'a>(
        &'a self,
        state: &'a WorkflowState,
        verb: &str,
        call: StepFuture<'a>,
    ) -> Result<StateUpdate, StepError> {
        let name = self.inner.name();
        let workflow_id = state.workflow_id.as_str();

        self.sink.record(&StepEvent::new(
            EventKind::Started,
            Level::Info,
            name,
            workflow_id,
            format!("Starting {} of step: {}", verb, name),
        ));
        let started = Instant::now();

        let result = call.await;
        let elapsed = started.elapsed();

        let event = match &result {
            Ok(_) => StepEvent::new(
                EventKind::Completed,
                Level::Info,
                name,
                workflow_id,
                format!("Completed {} of step: {}", verb, name),
            ),
            Err(e) => self.failure(state, verb, e),
        };
        self.sink.record(&event.with_duration(elapsed));

        result
    }

    fn failure(&self, state: &WorkflowState, verb: &str, err: &StepError) -> StepEvent {
        let name = self.inner.name();
        StepEvent::new(
            EventKind::Failed,
            Level::Error,
            name,
            &state.workflow_id,
            format!("Failed {} of step: {}: {}", verb, name, err),
        )
    }
}

#[async_trait]
impl<S: Step> Step for Logged<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        self.observe(state, "execution", self.inner.execute(state))
            .await
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        self.inner.input_request(state).map_err(|err| {
            self.sink.record(&self.failure(state, "input request", &err));
            err
        })
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        self.observe(state, "resumption", self.inner.resume(state, input))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::events::testing::RecordingSink;

    struct Echo {
        ok: bool,
    }

    #[async_trait]
    impl Step for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, _state: &WorkflowState) -> Result<StateUpdate, StepError> {
            if self.ok {
                Ok(StateUpdate::default())
            } else {
                Err(StepError::execution("broken pipe"))
            }
        }

        fn input_request(
            &self,
            _state: &WorkflowState,
        ) -> Result<Option<InputRequest>, StepError> {
            if self.ok {
                Ok(None)
            } else {
                Err(StepError::missing_field("reviewed_article", "no article"))
            }
        }
    }

    #[tokio::test]
    async fn test_logs_start_and_completion_with_duration() {
        let sink = Arc::new(RecordingSink::default());
        let step = Logged::new(Echo { ok: true }, sink.clone());
        let state = WorkflowState::new("wf-7", "query", 1).unwrap();

        step.execute(&state).await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Started);
        assert_eq!(events[0].workflow_id, "wf-7");
        assert!(events[0].duration.is_none());
        assert_eq!(events[1].kind, EventKind::Completed);
        assert!(events[1].duration.is_some());
    }

    #[tokio::test]
    async fn test_error_passes_through_and_is_logged() {
        let sink = Arc::new(RecordingSink::default());
        let step = Logged::new(Echo { ok: false }, sink.clone());
        let state = WorkflowState::new("wf-7", "query", 1).unwrap();

        let err = step.execute(&state).await.unwrap_err();
        assert_eq!(err.to_string(), "broken pipe");

        let events = sink.events.lock().unwrap();
        assert_eq!(events[1].kind, EventKind::Failed);
        assert_eq!(events[1].level, Level::Error);
    }

    #[test]
    fn test_input_request_failure_is_logged() {
        let sink = Arc::new(RecordingSink::default());
        let state = WorkflowState::new("wf-7", "query", 1).unwrap();

        let step = Logged::new(Echo { ok: true }, sink.clone());
        assert!(step.input_request(&state).unwrap().is_none());
        assert!(sink.kinds().is_empty());

        let step = Logged::new(Echo { ok: false }, sink.clone());
        let err = step.input_request(&state).unwrap_err();
        assert_eq!(err.to_string(), "no article");

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Failed);
        assert_eq!(events[0].step, "echo");
        assert!(events[0].message.contains("input request"));
    }

    #[tokio::test]
    async fn test_repeated_invocations_are_independent() {
        let sink = Arc::new(RecordingSink::default());
        let step = Logged::new(Echo { ok: true }, sink.clone());
        let state = WorkflowState::new("wf-7", "query", 1).unwrap();

        step.execute(&state).await.unwrap();
        step.execute(&state).await.unwrap();

        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::Started,
                EventKind::Completed,
                EventKind::Started,
                EventKind::Completed
            ]
        );
    }
}
