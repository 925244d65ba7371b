// SPDX-License-Identifier: MIT

//! Step development kit: the `Step` contract, its error taxonomy, step
//! events and the wrappers that add retry, logging and error handling.

pub mod error;
pub mod events;
pub mod step;
pub mod wrappers;
