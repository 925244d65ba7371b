// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use super::router::Router;
use crate::kit::step::Step;
use crate::quill::workflow::state::{Cursor, WorkflowState};

pub(crate) enum Transition {
    Direct(String),
    Conditional {
        router: Arc<dyn Router>,
        targets: HashMap<String, String>,
    },
}

/// A step as it sits in a compiled graph
#[derive(Clone)]
pub struct CompiledStep {
    pub step: Arc<dyn Step>,
    pub suspend_point: bool,
}

/// Immutable, validated step graph produced by `GraphBuilder::compile`
pub struct CompiledGraph {
    pub(crate) name: String,
    pub(crate) entry: String,
    pub(crate) order: Vec<String>,
    pub(crate) nodes: HashMap<String, CompiledStep>,
    pub(crate) transitions: HashMap<String, Transition>,
    pub(crate) finish: HashSet<String>,
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Step names in declaration order
    pub fn steps(&self) -> &[String] {
        &self.order
    }

    pub fn step(&self, name: &str) -> Option<&CompiledStep> {
        self.nodes.get(name)
    }

    pub fn is_suspend_point(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(|node| node.suspend_point)
    }

    pub fn suspend_points(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.is_suspend_point(name))
            .map(String::as_str)
            .collect()
    }

    pub fn is_finish(&self, name: &str) -> bool {
        self.finish.contains(name)
    }

    /// Where to go after `from` completed, given the merged state.
    ///
    /// Returns an error entry when a router yields an outcome that was not
    /// declared at compile time.
    pub fn next(&self, from: &str, state: &WorkflowState) -> Result<Cursor, String> {
        if self.finish.contains(from) {
            return Ok(Cursor::Completed);
        }
        match self.transitions.get(from) {
            Some(Transition::Direct(to)) => Ok(Cursor::step(to.as_str())),
            Some(Transition::Conditional { router, targets }) => {
                let outcome = router.route(state);
                match targets.get(&outcome) {
                    Some(to) => Ok(Cursor::step(to.as_str())),
                    None => Err(format!(
                        "Router on '{}' returned unknown outcome '{}'",
                        from, outcome
                    )),
                }
            }
            None => Err(format!("Step '{}' has no outgoing transition", from)),
        }
    }

    /// Human-readable listing of steps and transitions
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Workflow: {}", self.name);
        let _ = writeln!(out, "Entry: {}", self.entry);
        for name in &self.order {
            let marker = if self.is_suspend_point(name) {
                " [suspend]"
            } else {
                ""
            };
            if self.finish.contains(name) {
                let _ = writeln!(out, "  {}{} -> {}", name, marker, Cursor::COMPLETED);
                continue;
            }
            match self.transitions.get(name) {
                Some(Transition::Direct(to)) => {
                    let _ = writeln!(out, "  {}{} -> {}", name, marker, to);
                }
                Some(Transition::Conditional { router, targets }) => {
                    let branches: Vec<String> = router
                        .outcomes()
                        .iter()
                        .filter_map(|outcome| {
                            targets.get(outcome).map(|to| format!("{}: {}", outcome, to))
                        })
                        .collect();
                    let _ = writeln!(out, "  {}{} ?-> {}", name, marker, branches.join(" | "));
                }
                None => {}
            }
        }
        out
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("steps", &self.order)
            .finish()
    }
}
