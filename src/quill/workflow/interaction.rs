// SPDX-License-Identifier: MIT

//! Human-input collaborators
//!
//! The engine never blocks on a person. At a suspend point it returns an
//! `InputRequest`; something outside the engine obtains the decision and
//! calls `resume`. `drive` is that something for interactive runs: it asks
//! an `InputChannel` first and falls back to a synchronous prompt.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use super::graph::{RunOutcome, Workflow};
use super::state::WorkflowState;
use crate::kit::error::{StepError, WorkflowError};
use crate::kit::step::{HumanInput, InputKind, InputRequest};

/// Asynchronous source of decisions (a queue, a web hook, a test script)
#[async_trait]
pub trait InputChannel: Send + Sync {
    /// `Ok(None)` when no decision was supplied; `Err(Cancelled)` on interrupt
    async fn receive(&self, request: &InputRequest) -> Result<Option<HumanInput>, StepError>;
}

/// Synchronous interactive prompt used when the channel has nothing
pub trait PromptFallback: Send + Sync {
    fn prompt(&self, request: &InputRequest) -> Result<HumanInput, StepError>;
}

/// Channel that never supplies anything, so every decision goes to the
/// fallback prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChannel;

#[async_trait]
impl InputChannel for NoChannel {
    async fn receive(&self, _request: &InputRequest) -> Result<Option<HumanInput>, StepError> {
        Ok(None)
    }
}

/// Pre-supplied decisions, consumed in order
#[derive(Debug, Default)]
pub struct ScriptedInput {
    inputs: Mutex<VecDeque<HumanInput>>,
}

impl ScriptedInput {
    pub fn new(inputs: impl IntoIterator<Item = HumanInput>) -> Self {
        Self {
            inputs: Mutex::new(inputs.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.inputs.lock().map(|inputs| inputs.len()).unwrap_or(0)
    }

    fn next(&self) -> Option<HumanInput> {
        self.inputs.lock().ok()?.pop_front()
    }
}

#[async_trait]
impl InputChannel for ScriptedInput {
    async fn receive(&self, _request: &InputRequest) -> Result<Option<HumanInput>, StepError> {
        Ok(self.next())
    }
}

impl PromptFallback for ScriptedInput {
    fn prompt(&self, _request: &InputRequest) -> Result<HumanInput, StepError> {
        self.next()
            .ok_or_else(|| StepError::cancelled("No scripted input left"))
    }
}

const RULE: &str = "======================================================================";
const PREVIEW_CHARS: usize = 500;

/// Line-oriented terminal prompt.
///
/// Topic selection takes a number; approval takes `1`/`approve` or
/// `2`/`revise` followed by feedback. `quit` or a closed input cancels.
pub struct StdinPrompt {
    reader: Mutex<Box<dyn BufRead + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::from_io(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    pub fn from_io(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    fn say(&self, text: &str) -> Result<(), StepError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StepError::execution("prompt writer poisoned"))?;
        writeln!(writer, "{}", text).map_err(io_error)?;
        writer.flush().map_err(io_error)
    }

    fn ask(&self, question: &str) -> Result<String, StepError> {
        {
            let mut writer = self
                .writer
                .lock()
                .map_err(|_| StepError::execution("prompt writer poisoned"))?;
            write!(writer, "{}", question).map_err(io_error)?;
            writer.flush().map_err(io_error)?;
        }

        let mut line = String::new();
        let read = self
            .reader
            .lock()
            .map_err(|_| StepError::execution("prompt reader poisoned"))?
            .read_line(&mut line)
            .map_err(io_error)?;
        let line = line.trim().to_string();
        if read == 0 || line.eq_ignore_ascii_case("quit") {
            return Err(StepError::cancelled("Input cancelled by user"));
        }
        Ok(line)
    }

    fn select_topic(&self, request: &InputRequest) -> Result<HumanInput, StepError> {
        let topics = request
            .payload
            .get("topics")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        self.say(&format!("\n{}\nAVAILABLE TOPICS (sorted by relevance)\n{}", RULE, RULE))?;
        for (idx, topic) in topics.iter().enumerate() {
            let name = topic.get("topic").and_then(Value::as_str).unwrap_or("Unknown");
            let score = topic.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            self.say(&format!("\n{}. [Score: {:.1}] {}", idx + 1, score, name))?;
            if let Some(reasoning) = topic.get("reasoning").and_then(Value::as_str) {
                self.say(&format!("   {}", truncate(reasoning, 100)))?;
            }
        }
        self.say(&format!("\n{}", RULE))?;

        loop {
            let choice = self.ask(&format!("\nSelect a topic (1-{}): ", topics.len()))?;
            match choice.parse::<usize>() {
                Ok(n) if (1..=topics.len()).contains(&n) => return Ok(HumanInput::select(n)),
                Ok(_) => self.say(&format!(
                    "Please enter a number between 1 and {}",
                    topics.len()
                ))?,
                Err(_) => self.say("Please enter a valid number")?,
            }
        }
    }

    fn approve_article(&self, request: &InputRequest) -> Result<HumanInput, StepError> {
        let article = request.payload.get("article").cloned().unwrap_or(Value::Null);
        let field = |key: &str| article.get(key).and_then(Value::as_str).unwrap_or("").to_string();

        self.say(&format!("\n{}\nARTICLE REVIEW\n{}", RULE, RULE))?;
        self.say(&format!("\nTitle: {}", field("seo_title")))?;
        self.say(&format!("Subtitle: {}", field("seo_subtitle")))?;
        let tags: Vec<&str> = article
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        self.say(&format!("Tags: {}", tags.join(", ")))?;
        if let Some(words) = article.get("word_count").and_then(Value::as_u64) {
            self.say(&format!("Word Count: {}", words))?;
        }
        let content = field("polished_content");
        if !content.is_empty() {
            self.say(&format!("\n{}", truncate(&content, PREVIEW_CHARS)))?;
        }
        if let (Some(count), Some(max)) = (
            request.payload.get("revision_count").and_then(Value::as_u64),
            request.payload.get("max_revisions").and_then(Value::as_u64),
        ) {
            self.say(&format!("\nRevision {}/{}", count, max))?;
        }
        self.say(&format!(
            "\n{}\n  1. Approve - Proceed to publish\n  \
             2. Revise - Request changes with feedback\n{}",
            RULE, RULE
        ))?;

        loop {
            let choice = self.ask("\nEnter your choice (1 or 2): ")?.to_lowercase();
            match choice.as_str() {
                "1" | "approve" => return Ok(HumanInput::approve()),
                "2" | "revise" => {
                    let feedback = self.ask("\nFeedback: ")?;
                    if feedback.is_empty() {
                        self.say("Feedback cannot be empty")?;
                        continue;
                    }
                    return Ok(HumanInput::revise(feedback));
                }
                _ => self.say("Please enter 1 or 2")?,
            }
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptFallback for StdinPrompt {
    fn prompt(&self, request: &InputRequest) -> Result<HumanInput, StepError> {
        match request.kind {
            InputKind::TopicSelection => self.select_topic(request),
            InputKind::ArticleApproval => self.approve_article(request),
        }
    }
}

fn io_error(e: std::io::Error) -> StepError {
    StepError::execution(format!("terminal I/O failed: {}", e))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Obtain a decision: channel first, prompt when the channel has none
pub async fn collect_input(
    request: &InputRequest,
    channel: &dyn InputChannel,
    fallback: Arc<dyn PromptFallback>,
) -> Result<HumanInput, StepError> {
    if let Some(input) = channel.receive(request).await? {
        return Ok(input);
    }
    let request = request.clone();
    tokio::task::spawn_blocking(move || fallback.prompt(&request))
        .await
        .map_err(|e| StepError::execution(format!("prompt task failed: {}", e)))?
}

/// Run a workflow to a terminal state, answering every suspension.
///
/// Any failure to obtain input (cancellation, closed terminal) cancels the
/// session, which is then returned in its failed state.
pub async fn drive(
    workflow: &Workflow,
    session_key: &str,
    state: WorkflowState,
    channel: &dyn InputChannel,
    fallback: Arc<dyn PromptFallback>,
) -> Result<WorkflowState, WorkflowError> {
    let mut outcome = workflow
        .run_until_suspend_with_key(session_key, state)
        .await?;

    loop {
        let suspension = match outcome {
            RunOutcome::Suspended(suspension) => suspension,
            finished => return Ok(finished.into_state()),
        };

        match collect_input(&suspension.request, channel, fallback.clone()).await {
            Ok(input) => {
                outcome = workflow.resume(&suspension.session_key, input).await?;
            }
            Err(err) => {
                log::warn!(
                    "[{}] No input for {}: {}",
                    suspension.state.workflow_id,
                    suspension.step,
                    err
                );
                return workflow.cancel(&suspension.session_key, &err.to_string()).await;
            }
        }
    }
}
