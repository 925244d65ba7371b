// SPDX-License-Identifier: MIT

use super::StepFuture;
use crate::kit::error::{ErrorCategory, StepError};
use crate::kit::events::{EventKind, EventSink, LogSink, StepEvent};
use crate::kit::step::{HumanInput, InputRequest, Step};
use crate::quill::workflow::state::{StateUpdate, WorkflowState};
use async_trait::async_trait;
use log::Level;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Longest backoff between two attempts
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Which error categories the retry wrapper may retry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryOn {
    #[default]
    All,
    Only(Vec<ErrorCategory>),
}

impl RetryOn {
    fn allows(&self, category: ErrorCategory) -> bool {
        match self {
            RetryOn::All => true,
            RetryOn::Only(categories) => categories.contains(&category),
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before retry `n` is `time_unit * backoff_factor^n`
    pub backoff_factor: f64,
    #[serde(rename = "time_unit_ms", with = "millis")]
    pub time_unit: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            time_unit: Duration::from_secs(1),
            retry_on: RetryOn::All,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, err: &StepError) -> bool {
        err.is_retryable() && self.retry_on.allows(err.category())
    }

    /// Backoff before retry number `attempt` (0-based), saturating at
    /// `MAX_RETRY_DELAY`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.time_unit.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.time_unit.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Re-runs the inner step on eligible failures.
///
/// After `max_retries` extra attempts the last error is returned for the
/// error-handling wrapper to convert. When a step succeeds after retries
/// the extra attempts are added to `retry_count`.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl<S: Step> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sink: Arc::new(LogSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt<'a, F>(
        &'a self,
        state: &'a WorkflowState,
        call: F,
    ) -> Result<StateUpdate, StepError>
    where
        F: Fn() -> StepFuture<'a> + Send + Sync,
    {
        let name = self.inner.name();
        let total = self.policy.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            let err = match call().await {
                Ok(mut update) => {
                    if attempt > 0 {
                        update.retry_count = Some(state.retry_count + attempt);
                    }
                    return Ok(update);
                }
                Err(err) => err,
            };

            if !self.policy.should_retry(&err) {
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                log::error!(
                    "[{}] Step '{}' failed after {} attempts. Final error: {}: {}",
                    state.workflow_id,
                    name,
                    total,
                    err.category(),
                    err
                );
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            self.sink.record(&StepEvent::new(
                EventKind::Retrying,
                Level::Warn,
                name,
                &state.workflow_id,
                format!(
                    "Step '{}' failed (attempt {}/{}). Retrying in {:.1}s... Error: {}: {}",
                    name,
                    attempt + 1,
                    total,
                    delay.as_secs_f64(),
                    err.category(),
                    err
                ),
            ));
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<S: Step> Step for Retrying<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        self.attempt(state, || self.inner.execute(state)).await
    }

    fn input_request(&self, state: &WorkflowState) -> Result<Option<InputRequest>, StepError> {
        self.inner.input_request(state)
    }

    async fn resume(
        &self,
        state: &WorkflowState,
        input: &HumanInput,
    ) -> Result<StateUpdate, StepError> {
        self.attempt(state, || self.inner.resume(state, input))
            .await
    }
}
