// SPDX-License-Identifier: MIT

//! Typed error handling for quill-rs
//!
//! Two layers live here:
//! - `StepError` is what a step body (or a collaborator it calls) reports.
//!   The wrappers in `kit::wrappers` convert it into workflow state, so the
//!   engine never propagates one to its caller.
//! - `WorkflowError` is what the engine itself returns: graph compilation
//!   problems, registry misuse, checkpoint failures, invalid sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure raised inside a step
#[derive(Debug, Error)]
pub enum StepError {
    /// Required state fields missing or malformed
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    /// A collaborator service (language model, search API, database) failed
    #[error("{service}: {message}")]
    Api { service: String, message: String },

    /// Any other failure in the step body
    #[error("{0}")]
    Execution(String),

    /// Payload could not be (de)serialized
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Interrupted while waiting for human input
    #[error("{0}")]
    Cancelled(String),
}

/// Coarse classification of a `StepError`, used for retry eligibility
/// and in the error entries appended to state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Api,
    Execution,
    Serialization,
    Cancelled,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Validation => "ValidationError",
            ErrorCategory::Api => "ApiError",
            ErrorCategory::Execution => "ExecutionError",
            ErrorCategory::Serialization => "SerializationError",
            ErrorCategory::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl StepError {
    /// Create a validation error for a named state field
    pub fn missing_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Create a validation error not tied to a single field
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Create a collaborator error
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StepError::Validation { .. } => ErrorCategory::Validation,
            StepError::Api { .. } => ErrorCategory::Api,
            StepError::Execution(_) => ErrorCategory::Execution,
            StepError::Serialization(_) => ErrorCategory::Serialization,
            StepError::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }

    /// Validation failures and cancellations are never worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Cancelled
        )
    }

    /// Render the single error entry recorded in workflow state
    pub fn to_entry(&self, step: &str) -> String {
        format!("Step '{}' failed: {}: {}", step, self.category(), self)
    }
}

impl From<&str> for StepError {
    fn from(s: &str) -> Self {
        Self::Execution(s.to_string())
    }
}

impl From<String> for StepError {
    fn from(s: String) -> Self {
        Self::Execution(s)
    }
}

/// Invariant violations on `WorkflowState`
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("max_revisions must be at least 1, got {0}")]
    InvalidMaxRevisions(u32),

    #[error("revision_count ({count}) exceeds max_revisions ({max})")]
    RevisionOverflow { count: u32, max: u32 },
}

/// Checkpoint persistence errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("No checkpoint stored for session '{0}'")]
    NotFound(String),

    #[error("Checkpoint for session '{requested}' holds session '{stored}'")]
    KeyMismatch { requested: String, stored: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Engine-level errors returned to callers
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step '{0}' is already registered")]
    DuplicateStep(String),

    #[error("Step '{name}' not registered. Available steps: {}", format_available(.available))]
    StepNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("{context} references unregistered step '{name}'")]
    UnknownStep { context: String, name: String },

    #[error("Step name '{0}' is reserved")]
    ReservedName(String),

    #[error("Graph has no entry step")]
    MissingEntry,

    #[error("Graph has no finish step")]
    MissingFinish,

    #[error("Router on '{from}' can yield '{outcome}' but no target is mapped for it")]
    UnmappedOutcome { from: String, outcome: String },

    #[error("Step '{0}' has more than one outgoing transition")]
    AmbiguousEdges(String),

    #[error("Step '{0}' is not a finish step and has no outgoing edge")]
    DanglingStep(String),

    #[error("Invalid workflow state: {0}")]
    InvalidState(#[from] StateError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Session '{0}' already reached a terminal state")]
    SessionTerminal(String),

    #[error("Session '{session}' at '{step}' rejected the input: {message}")]
    RejectedInput {
        session: String,
        step: String,
        message: String,
    },

    #[error("Transition limit of {0} reached")]
    TransitionLimit(u32),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_available(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl WorkflowError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
