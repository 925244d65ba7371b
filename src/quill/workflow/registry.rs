// SPDX-License-Identifier: MIT

use crate::kit::error::WorkflowError;
use crate::kit::step::Step;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A step as registered: its name, implementation and flags
#[derive(Clone)]
pub struct StepDescriptor {
    pub name: String,
    pub step: Arc<dyn Step>,
    pub suspend_point: bool,
}

impl StepDescriptor {
    /// Describe a step under its own name
    pub fn new(step: Arc<dyn Step>) -> Self {
        Self {
            name: step.name().to_string(),
            step,
            suspend_point: false,
        }
    }

    /// Mark the step as a point where execution may pause for human input
    pub fn suspend_point(mut self) -> Self {
        self.suspend_point = true;
        self
    }
}

impl std::fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("suspend_point", &self.suspend_point)
            .finish()
    }
}

/// Name -> step lookup used by the graph compiler.
///
/// Populated once at startup and read-only afterwards; clones share the
/// same table.
#[derive(Clone)]
pub struct StepRegistry {
    steps: Arc<RwLock<HashMap<String, StepDescriptor>>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a descriptor; a second registration under the same name fails
    pub async fn register(&self, descriptor: StepDescriptor) -> Result<(), WorkflowError> {
        let mut steps = self.steps.write().await;
        if steps.contains_key(&descriptor.name) {
            return Err(WorkflowError::DuplicateStep(descriptor.name));
        }
        log::debug!(
            "Registered step: {}{}",
            descriptor.name,
            if descriptor.suspend_point {
                " (suspend point)"
            } else {
                ""
            }
        );
        steps.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<StepDescriptor, WorkflowError> {
        let steps = self.steps.read().await;
        match steps.get(name) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => Err(WorkflowError::StepNotFound {
                name: name.to_string(),
                available: sorted_names(&steps),
            }),
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.steps.read().await.contains_key(name)
    }

    /// All registered names in sorted order
    pub async fn list(&self) -> Vec<String> {
        sorted_names(&*self.steps.read().await)
    }

    pub async fn len(&self) -> usize {
        self.steps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.steps.read().await.is_empty()
    }

    /// Remove everything; for test isolation
    pub async fn clear(&self) {
        self.steps.write().await.clear();
        log::debug!("Cleared step registry");
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_names(steps: &HashMap<String, StepDescriptor>) -> Vec<String> {
    let mut names: Vec<String> = steps.keys().cloned().collect();
    names.sort();
    names
}
