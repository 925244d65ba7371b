// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Runs a compiled graph one step at a time. Execution is two-phase: a run
//! proceeds until a suspend point needs human input, persists a checkpoint
//! and returns; a later `resume` reloads the checkpoint, feeds the input to
//! the waiting step and carries on.

use std::sync::Arc;

use super::compiled::CompiledGraph;
use crate::kit::error::{StepError, WorkflowError};
use crate::kit::step::{HumanInput, InputRequest};
use crate::kit::wrappers::failure_update;
use crate::quill::workflow::checkpoint::{Checkpoint, CheckpointStore};
use crate::quill::workflow::state::{Cursor, StateUpdate, WorkflowState};

/// Safety limit on step transitions per run or resume
pub const DEFAULT_MAX_TRANSITIONS: u32 = 100;

/// Where a run stopped
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(WorkflowState),
    Failed(WorkflowState),
    Suspended(Suspension),
}

impl RunOutcome {
    pub fn state(&self) -> &WorkflowState {
        match self {
            RunOutcome::Completed(state) | RunOutcome::Failed(state) => state,
            RunOutcome::Suspended(suspension) => &suspension.state,
        }
    }

    pub fn into_state(self) -> WorkflowState {
        match self {
            RunOutcome::Completed(state) | RunOutcome::Failed(state) => state,
            RunOutcome::Suspended(suspension) => suspension.state,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended(_))
    }
}

/// A run paused at a suspend point, waiting for `HumanInput`
#[derive(Debug, Clone)]
pub struct Suspension {
    pub session_key: String,
    pub step: String,
    pub request: InputRequest,
    pub state: WorkflowState,
}

/// Executes a `CompiledGraph` against a checkpoint store
#[derive(Clone)]
pub struct Workflow {
    graph: Arc<CompiledGraph>,
    store: Arc<dyn CheckpointStore>,
    max_transitions: u32,
}

impl Workflow {
    pub fn new(graph: CompiledGraph, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    pub fn with_max_transitions(mut self, max_transitions: u32) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Run from the state's cursor until the workflow finishes, fails or
    /// suspends. The session key is the workflow id.
    pub async fn run_until_suspend(
        &self,
        state: WorkflowState,
    ) -> Result<RunOutcome, WorkflowError> {
        let session_key = state.workflow_id.clone();
        self.run_until_suspend_with_key(&session_key, state).await
    }

    pub async fn run_until_suspend_with_key(
        &self,
        session_key: &str,
        state: WorkflowState,
    ) -> Result<RunOutcome, WorkflowError> {
        state.validate()?;
        log::info!(
            "[{}] Starting workflow '{}' at {}",
            state.workflow_id,
            self.graph.name(),
            state.current_step
        );
        self.drive(session_key, state, None, None).await
    }

    /// Continue a suspended session with the caller's decision
    pub async fn resume(
        &self,
        session_key: &str,
        input: HumanInput,
    ) -> Result<RunOutcome, WorkflowError> {
        let checkpoint = self.store.load(session_key).await?;
        if checkpoint.is_terminal() {
            return Err(WorkflowError::SessionTerminal(session_key.to_string()));
        }
        if input.kind() != checkpoint.request.kind {
            return Err(WorkflowError::RejectedInput {
                session: session_key.to_string(),
                step: checkpoint.step.clone(),
                message: format!(
                    "expected {:?} input, got {:?}",
                    checkpoint.request.kind,
                    input.kind()
                ),
            });
        }

        log::info!(
            "[{}] Resuming session {} at {}",
            checkpoint.state.workflow_id,
            session_key,
            checkpoint.step
        );
        let state = checkpoint.state.clone();
        self.drive(session_key, state, Some(input), Some(checkpoint))
            .await
    }

    /// Abort a suspended session: append a cancellation entry, mark it
    /// failed and persist the result.
    pub async fn cancel(
        &self,
        session_key: &str,
        reason: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let checkpoint = self.store.load(session_key).await?;
        if checkpoint.is_terminal() {
            return Err(WorkflowError::SessionTerminal(session_key.to_string()));
        }

        let mut state = checkpoint.state.clone();
        let err = StepError::cancelled(reason);
        state.apply(failure_update(&checkpoint.step, &state.workflow_id, &err));
        log::warn!("[{}] Session {} cancelled", state.workflow_id, session_key);

        self.store
            .save(&checkpoint.with_state(state.clone()))
            .await?;
        Ok(state)
    }

    async fn drive(
        &self,
        session_key: &str,
        mut state: WorkflowState,
        mut input: Option<HumanInput>,
        origin: Option<Checkpoint>,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut transitions = 0;

        loop {
            let name = match state.current_step.clone() {
                Cursor::Pending => {
                    state.current_step = Cursor::step(self.graph.entry());
                    continue;
                }
                Cursor::Completed => {
                    log::info!("[{}] Workflow completed", state.workflow_id);
                    self.persist_terminal(origin, &state).await?;
                    return Ok(RunOutcome::Completed(state));
                }
                Cursor::Failed => {
                    log::error!(
                        "[{}] Workflow failed: {}",
                        state.workflow_id,
                        state.errors.last().map(String::as_str).unwrap_or("")
                    );
                    self.persist_terminal(origin, &state).await?;
                    return Ok(RunOutcome::Failed(state));
                }
                Cursor::Step(name) => name,
            };

            transitions += 1;
            if transitions > self.max_transitions {
                let err = WorkflowError::TransitionLimit(self.max_transitions);
                log::error!("[{}] {}", state.workflow_id, err);
                state.apply(StateUpdate::failed(format!("{} at step '{}'", err, name)));
                continue;
            }

            let Some(node) = self.graph.step(&name) else {
                state.apply(StateUpdate::failed(format!(
                    "Step '{}' is not part of workflow '{}'",
                    name,
                    self.graph.name()
                )));
                continue;
            };

            log::info!("[{}] Executing step: {}", state.workflow_id, name);
            let result = if let Some(decision) = input.take() {
                node.step.resume(&state, &decision).await
            } else if node.suspend_point {
                match node.step.input_request(&state) {
                    Ok(Some(request)) => {
                        return self.suspend(session_key, name, request, state).await;
                    }
                    Ok(None) => node.step.execute(&state).await,
                    Err(err) => Err(err),
                }
            } else {
                node.step.execute(&state).await
            };

            // Wrapped steps never return Err; unwrapped ones still must not
            // escape as an engine error.
            let update = result
                .unwrap_or_else(|err| failure_update(&name, &state.workflow_id, &err));
            state.apply(update);
            if state.is_terminal() {
                continue;
            }

            match self.graph.next(&name, &state) {
                Ok(cursor) => {
                    log::debug!("[{}] {} -> {}", state.workflow_id, name, cursor);
                    state.current_step = cursor;
                }
                Err(entry) => state.apply(StateUpdate::failed(entry)),
            }
        }
    }

    async fn suspend(
        &self,
        session_key: &str,
        step: String,
        request: InputRequest,
        state: WorkflowState,
    ) -> Result<RunOutcome, WorkflowError> {
        let checkpoint = Checkpoint::new(session_key, step.clone(), request.clone(), state.clone());
        self.store.save(&checkpoint).await?;
        log::info!(
            "[{}] Suspended at {} waiting for {:?} (session {})",
            state.workflow_id,
            step,
            request.kind,
            session_key
        );
        Ok(RunOutcome::Suspended(Suspension {
            session_key: session_key.to_string(),
            step,
            request,
            state,
        }))
    }

    /// A resumed session that finishes is stored with its final state so it
    /// cannot be resumed again.
    async fn persist_terminal(
        &self,
        origin: Option<Checkpoint>,
        state: &WorkflowState,
    ) -> Result<(), WorkflowError> {
        if let Some(checkpoint) = origin {
            self.store.save(&checkpoint.with_state(state.clone())).await?;
        }
        Ok(())
    }
}
