// SPDX-License-Identifier: MIT

//! State management for workflows
//!
//! This module provides:
//! - `WorkflowState` - the document threaded through every step
//! - `StateUpdate` - the sparse delta a step returns
//! - `Cursor` / `Slot` - the step cursor and the named stage outputs

mod schema;
mod store;
mod update;

pub use schema::{Cursor, Slot};
pub use store::WorkflowState;
pub use update::StateUpdate;
