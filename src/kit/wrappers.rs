// SPDX-License-Identifier: MIT

//! Step wrappers
//!
//! Each wrapper implements `Step` around an inner step, so they stack:
//! - `ErrorHandled` turns any `StepError` into a failed state update
//! - `Logged` records start/completion/failure events
//! - `Retrying` re-runs eligible failures with exponential backoff
//!
//! `compose` builds the standard stack `ErrorHandled(Logged(Retrying(step)))`.
//! Retrying must sit inside error handling, otherwise the retry loop would
//! only ever see successful updates.

mod error_handling;
mod logging;
mod retry;

pub use error_handling::{failure_update, ErrorHandled};
pub use logging::Logged;
pub use retry::{RetryOn, RetryPolicy, Retrying, MAX_RETRY_DELAY};

use crate::kit::error::StepError;
use crate::kit::events::EventSink;
use crate::kit::step::Step;
use crate::quill::workflow::state::StateUpdate;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by `Step::execute` / `Step::resume`
pub(crate) type StepFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StateUpdate, StepError>> + Send + 'a>>;

/// Wrap a step with retry, logging and error handling
pub fn compose<S>(step: S, policy: RetryPolicy, sink: Arc<dyn EventSink>) -> Arc<dyn Step>
where
    S: Step + 'static,
{
    let retrying = Retrying::new(step, policy).with_sink(sink.clone());
    Arc::new(ErrorHandled::new(Logged::new(retrying, sink)))
}
