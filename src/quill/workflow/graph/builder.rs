// SPDX-License-Identifier: MIT

//! Declarative graph construction and compilation

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::compiled::{CompiledGraph, CompiledStep, Transition};
use super::router::Router;
use crate::kit::error::WorkflowError;
use crate::quill::workflow::registry::StepRegistry;
use crate::quill::workflow::state::Cursor;

struct ConditionalEdge {
    from: String,
    router: Arc<dyn Router>,
    targets: HashMap<String, String>,
}

/// Collects steps, edges and markers, then validates them against a
/// `StepRegistry` in `compile`.
///
/// Nothing is checked while building; every problem is reported by
/// `compile`, which is the only place a `CompiledGraph` comes from.
pub struct GraphBuilder {
    name: String,
    steps: Vec<String>,
    edges: Vec<(String, String)>,
    conditional: Vec<ConditionalEdge>,
    entry: Option<String>,
    finish: Vec<String>,
    interrupts: Vec<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            edges: Vec::new(),
            conditional: Vec::new(),
            entry: None,
            finish: Vec::new(),
            interrupts: Vec::new(),
        }
    }

    /// Declare a step by its registered name
    pub fn add_step(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.steps.contains(&name) {
            self.steps.push(name);
        }
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Route out of `from` with `router`; `targets` maps each outcome to a step
    pub fn add_conditional_edges<R>(
        mut self,
        from: impl Into<String>,
        router: R,
        targets: &[(&str, &str)],
    ) -> Self
    where
        R: Router + 'static,
    {
        self.conditional.push(ConditionalEdge {
            from: from.into(),
            router: Arc::new(router),
            targets: targets
                .iter()
                .map(|(outcome, to)| (outcome.to_string(), to.to_string()))
                .collect(),
        });
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Mark a step whose successful completion completes the workflow
    pub fn set_finish(mut self, name: impl Into<String>) -> Self {
        self.finish.push(name.into());
        self
    }

    /// Suspend before running `name`, in addition to steps registered as
    /// suspend points
    pub fn interrupt_before(mut self, name: impl Into<String>) -> Self {
        self.interrupts.push(name.into());
        self
    }

    /// Validate the graph against `registry` and freeze it.
    ///
    /// Fails when a declared step is not registered or uses a reserved
    /// name, when an edge, marker or router target names an undeclared
    /// step, when a router outcome has no target, when a step has two
    /// outgoing transitions, or when a non-finish step has none.
    /// Steps unreachable from the entry only produce a warning.
    pub async fn compile(self, registry: &StepRegistry) -> Result<CompiledGraph, WorkflowError> {
        let declared: HashSet<&str> = self.steps.iter().map(String::as_str).collect();
        let check_declared = |context: String, name: &str| -> Result<(), WorkflowError> {
            if declared.contains(name) {
                Ok(())
            } else {
                Err(WorkflowError::UnknownStep {
                    context,
                    name: name.to_string(),
                })
            }
        };

        let interrupts: HashSet<&str> = self.interrupts.iter().map(String::as_str).collect();
        let mut nodes = HashMap::new();
        for name in &self.steps {
            if Cursor::is_reserved(name) {
                return Err(WorkflowError::ReservedName(name.clone()));
            }
            let descriptor = registry.get(name).await?;
            let suspend_point = descriptor.suspend_point || interrupts.contains(name.as_str());
            nodes.insert(
                name.clone(),
                CompiledStep {
                    step: descriptor.step,
                    suspend_point,
                },
            );
        }

        let entry = self.entry.clone().ok_or(WorkflowError::MissingEntry)?;
        check_declared("Entry point".to_string(), &entry)?;

        if self.finish.is_empty() {
            return Err(WorkflowError::MissingFinish);
        }
        for name in &self.finish {
            check_declared("Finish marker".to_string(), name)?;
        }
        for name in &self.interrupts {
            check_declared("Interrupt".to_string(), name)?;
        }

        let finish: HashSet<String> = self.finish.iter().cloned().collect();
        let mut transitions: HashMap<String, Transition> = HashMap::new();

        for (from, to) in &self.edges {
            let context = format!("Edge '{}' -> '{}'", from, to);
            check_declared(context.clone(), from)?;
            check_declared(context, to)?;
            if finish.contains(from) || transitions.contains_key(from) {
                return Err(WorkflowError::AmbiguousEdges(from.clone()));
            }
            transitions.insert(from.clone(), Transition::Direct(to.clone()));
        }

        for edge in self.conditional {
            check_declared("Conditional edge".to_string(), &edge.from)?;
            for outcome in edge.router.outcomes() {
                if !edge.targets.contains_key(&outcome) {
                    return Err(WorkflowError::UnmappedOutcome {
                        from: edge.from.clone(),
                        outcome,
                    });
                }
            }
            for (outcome, to) in &edge.targets {
                check_declared(
                    format!("Outcome '{}' of '{}'", outcome, edge.from),
                    to,
                )?;
            }
            if finish.contains(&edge.from) || transitions.contains_key(&edge.from) {
                return Err(WorkflowError::AmbiguousEdges(edge.from));
            }
            transitions.insert(
                edge.from,
                Transition::Conditional {
                    router: edge.router,
                    targets: edge.targets,
                },
            );
        }

        for name in &self.steps {
            if !finish.contains(name) && !transitions.contains_key(name) {
                return Err(WorkflowError::DanglingStep(name.clone()));
            }
        }

        let reachable = reachable_from(&entry, &transitions);
        for name in &self.steps {
            if !reachable.contains(name.as_str()) {
                log::warn!(
                    "Step '{}' in graph '{}' is unreachable from '{}'",
                    name,
                    self.name,
                    entry
                );
            }
        }

        log::info!(
            "Compiled graph '{}' with {} steps, entry '{}'",
            self.name,
            self.steps.len(),
            entry
        );

        Ok(CompiledGraph {
            name: self.name,
            entry,
            order: self.steps,
            nodes,
            transitions,
            finish,
        })
    }
}

fn reachable_from<'a>(
    entry: &'a str,
    transitions: &'a HashMap<String, Transition>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([entry]);
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name) {
            continue;
        }
        match transitions.get(name) {
            Some(Transition::Direct(to)) => queue.push_back(to.as_str()),
            Some(Transition::Conditional { targets, .. }) => {
                queue.extend(targets.values().map(String::as_str))
            }
            None => {}
        }
    }
    seen
}
