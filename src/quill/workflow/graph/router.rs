// SPDX-License-Identifier: MIT

//! Conditional routers
//!
//! A router picks one outcome from a fixed set by looking at the state
//! after the originating step's update has been merged. The graph maps
//! every outcome to a target step at compile time.

use crate::quill::workflow::state::WorkflowState;

pub trait Router: Send + Sync {
    /// Every outcome `route` can return
    fn outcomes(&self) -> Vec<String>;

    fn route(&self, state: &WorkflowState) -> String;
}

/// Router backed by a closure
pub struct FnRouter<F> {
    outcomes: Vec<String>,
    route: F,
}

impl<F> FnRouter<F>
where
    F: Fn(&WorkflowState) -> String + Send + Sync,
{
    pub fn new(outcomes: &[&str], route: F) -> Self {
        Self {
            outcomes: outcomes.iter().map(|o| o.to_string()).collect(),
            route,
        }
    }
}

impl<F> Router for FnRouter<F>
where
    F: Fn(&WorkflowState) -> String + Send + Sync,
{
    fn outcomes(&self) -> Vec<String> {
        self.outcomes.clone()
    }

    fn route(&self, state: &WorkflowState) -> String {
        (self.route)(state)
    }
}

/// Routes on the human approval flag.
///
/// Only an explicit `approved == true` leads to `approve`; `false` or an
/// absent decision both fall through to `revise`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApprovalRouter;

impl ApprovalRouter {
    pub const APPROVE: &'static str = "approve";
    pub const REVISE: &'static str = "revise";
}

impl Router for ApprovalRouter {
    fn outcomes(&self) -> Vec<String> {
        vec![Self::APPROVE.to_string(), Self::REVISE.to_string()]
    }

    fn route(&self, state: &WorkflowState) -> String {
        if state.approved == Some(true) {
            log::info!("[{}] Article approved, routing to save", state.workflow_id);
            Self::APPROVE.to_string()
        } else {
            log::info!(
                "[{}] Revision requested, routing to revise",
                state.workflow_id
            );
            Self::REVISE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(approved: Option<bool>, feedback: Option<&str>) -> WorkflowState {
        let mut state = WorkflowState::new("wf-route", "query", 3).unwrap();
        state.approved = approved;
        state.feedback = feedback.map(str::to_string);
        state
    }

    #[test]
    fn test_approve_routes_to_approve() {
        let outcome = ApprovalRouter.route(&state_with(Some(true), None));
        assert_eq!(outcome, ApprovalRouter::APPROVE);
    }

    #[test]
    fn test_revise_with_feedback_routes_to_revise() {
        let outcome = ApprovalRouter.route(&state_with(Some(false), Some("add examples")));
        assert_eq!(outcome, ApprovalRouter::REVISE);
    }

    #[test]
    fn test_missing_decision_defaults_to_revise() {
        assert_eq!(
            ApprovalRouter.route(&state_with(None, None)),
            ApprovalRouter::REVISE
        );
    }

    #[test]
    fn test_fn_router() {
        let router = FnRouter::new(&["short", "long"], |state: &WorkflowState| {
            if state.input_query.len() > 10 {
                "long".to_string()
            } else {
                "short".to_string()
            }
        });
        assert_eq!(router.outcomes(), vec!["short", "long"]);
        assert_eq!(router.route(&state_with(None, None)), "short");
    }
}
