// SPDX-License-Identifier: MIT

pub mod pipeline;
pub mod workflow;
