// SPDX-License-Identifier: MIT

pub mod checkpoint;
pub mod config;
pub mod graph;
pub mod interaction;
pub mod registry;
pub mod state;
