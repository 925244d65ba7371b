// SPDX-License-Identifier: MIT

//! Structured step events and the sinks that receive them

use log::Level;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started,
    Completed,
    Failed,
    Retrying,
}

/// One observation about a step execution
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub step: String,
    pub workflow_id: String,
    pub level: Level,
    pub kind: EventKind,
    pub message: String,
    pub duration: Option<Duration>,
}

impl StepEvent {
    pub fn new(
        kind: EventKind,
        level: Level,
        step: &str,
        workflow_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step: step.to_string(),
            workflow_id: workflow_id.to_string(),
            level,
            kind,
            message: message.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Receives step events. Formatting and transport are up to the sink.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &StepEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &StepEvent) {
        match event.duration {
            Some(d) => log::log!(
                target: "quill::step",
                event.level,
                "[{}] {} ({:.2}s)",
                event.workflow_id,
                event.message,
                d.as_secs_f64()
            ),
            None => log::log!(
                target: "quill::step",
                event.level,
                "[{}] {}",
                event.workflow_id,
                event.message
            ),
        }
    }
}
