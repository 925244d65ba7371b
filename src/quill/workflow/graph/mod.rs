// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! `GraphBuilder` declares steps and transitions, `compile` validates them
//! into a `CompiledGraph`, and `Workflow` runs it with suspend/resume.

mod builder;
mod compiled;
pub mod executor;
pub mod router;

pub use builder::GraphBuilder;
pub use compiled::{CompiledGraph, CompiledStep};
pub use executor::{RunOutcome, Suspension, Workflow, DEFAULT_MAX_TRANSITIONS};
pub use router::{ApprovalRouter, FnRouter, Router};
