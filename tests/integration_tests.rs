// SPDX-License-Identifier: MIT

//! Integration tests for the article workflow
//!
//! These tests drive the full pipeline end to end using placeholder stage
//! bodies and mock components.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use quill_rs::kit::error::{StepError, WorkflowError};
use quill_rs::kit::events::{EventKind, EventSink, StepEvent};
use quill_rs::kit::step::{HumanInput, InputKind, Step};
use quill_rs::kit::wrappers::RetryPolicy;
use quill_rs::quill::pipeline::{self, build_article_workflow, ArticleStages, PlaceholderStage};
use quill_rs::quill::workflow::checkpoint::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use quill_rs::quill::workflow::config::EngineConfig;
use quill_rs::quill::workflow::graph::{RunOutcome, Suspension, Workflow};
use quill_rs::quill::workflow::interaction::{drive, ScriptedInput};
use quill_rs::quill::workflow::state::{Cursor, Slot, StateUpdate, WorkflowState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Components
// ============================================================================

/// Millisecond backoff so retry scenarios finish quickly
static FAST_CONFIG: Lazy<EngineConfig> = Lazy::new(|| EngineConfig {
    retry: RetryPolicy {
        max_retries: 2,
        time_unit: Duration::from_millis(1),
        ..RetryPolicy::default()
    },
    ..EngineConfig::default()
});

/// Placeholder stage that fails its first `failures` calls
struct FlakyStage {
    inner: PlaceholderStage,
    failures: usize,
    error: fn() -> StepError,
    calls: Arc<AtomicUsize>,
}

impl FlakyStage {
    fn new(
        name: &'static str,
        failures: usize,
        error: fn() -> StepError,
    ) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: PlaceholderStage::new(name),
                failures,
                error,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Step for FlakyStage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err((self.error)());
        }
        self.inner.execute(state).await
    }
}

/// Event sink that keeps everything it sees
#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<StepEvent>>,
}

impl CollectingSink {
    fn for_step(&self, step: &str) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.step == step)
            .map(|e| e.kind)
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: &StepEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

async fn article_workflow(stages: ArticleStages) -> Workflow {
    build_article_workflow(
        stages,
        &FAST_CONFIG,
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(CollectingSink::default()),
    )
    .await
    .unwrap()
}

async fn file_workflow(config: &EngineConfig) -> Workflow {
    build_article_workflow(
        ArticleStages::placeholder(),
        config,
        Arc::new(FileCheckpointStore::new(&config.checkpoint_dir)),
        Arc::new(CollectingSink::default()),
    )
    .await
    .unwrap()
}

fn expect_suspended(outcome: RunOutcome, step: &str) -> Suspension {
    match outcome {
        RunOutcome::Suspended(suspension) => {
            assert_eq!(suspension.step, step);
            suspension
        }
        other => panic!(
            "expected suspension at {}, got {:?} with errors {:?}",
            step,
            other.state().current_step,
            other.state().errors
        ),
    }
}

fn start(query: &str, max_revisions: u32) -> WorkflowState {
    WorkflowState::start(query, max_revisions).unwrap()
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_happy_path_select_then_approve() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let state = start("rust async", 3);
    let id = state.workflow_id.clone();

    let selection = expect_suspended(
        workflow.run_until_suspend(state).await.unwrap(),
        pipeline::USER_SELECTION,
    );
    assert_eq!(selection.request.kind, InputKind::TopicSelection);
    assert_eq!(selection.request.payload["topics"].as_array().unwrap().len(), 3);
    assert!(selection.state.has_slot(Slot::ScoredTopics));
    assert!(!selection.state.has_slot(Slot::Outline));

    let approval = expect_suspended(
        workflow.resume(&id, HumanInput::select(2)).await.unwrap(),
        pipeline::USER_APPROVAL,
    );
    assert_eq!(
        approval.state.selected_topic.as_deref(),
        Some("rust async in production")
    );
    assert_eq!(
        approval.request.payload["article"]["seo_title"],
        "rust async in production"
    );

    let outcome = workflow.resume(&id, HumanInput::approve()).await.unwrap();
    let RunOutcome::Completed(state) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(state.current_step, Cursor::Completed);
    assert_eq!(state.approved, Some(true));
    assert_eq!(state.revision_count, 0);
    assert!(state.errors.is_empty());
    for slot in [
        Slot::Outline,
        Slot::ResearchDossiers,
        Slot::WrittenSections,
        Slot::FinalArticle,
    ] {
        assert!(state.has_slot(slot), "missing {}", slot);
    }
    assert_eq!(
        state.get_slot(Slot::ArticleId),
        Some(&serde_json::json!(format!("article-{}", id)))
    );
}

#[tokio::test]
async fn test_revision_loop_returns_to_approval() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let state = start("databases", 3);
    let id = state.workflow_id.clone();

    workflow.run_until_suspend(state).await.unwrap();
    workflow.resume(&id, HumanInput::select(1)).await.unwrap();

    let again = expect_suspended(
        workflow
            .resume(&id, HumanInput::revise("add a benchmark section"))
            .await
            .unwrap(),
        pipeline::USER_APPROVAL,
    );
    assert_eq!(again.state.revision_count, 1);
    assert_eq!(again.state.approved, Some(false));
    assert_eq!(again.request.payload["revision_count"], 1);
    let content = again.state.get_path("reviewed_article.polished_content").unwrap();
    assert!(content
        .as_str()
        .unwrap()
        .ends_with("Revised per feedback: add a benchmark section"));

    let state = workflow
        .resume(&id, HumanInput::approve())
        .await
        .unwrap()
        .into_state();
    assert_eq!(state.current_step, Cursor::Completed);
    assert_eq!(state.revision_count, 1);
}

#[tokio::test]
async fn test_revision_cap_forces_approval() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let state = start("compilers", 1);
    let id = state.workflow_id.clone();

    workflow.run_until_suspend(state).await.unwrap();
    workflow.resume(&id, HumanInput::select(3)).await.unwrap();

    // The one allowed revision exhausts the cap: no second approval prompt
    let outcome = workflow
        .resume(&id, HumanInput::revise("shorter"))
        .await
        .unwrap();
    let RunOutcome::Completed(state) = outcome else {
        panic!("expected forced approval to complete the run");
    };
    assert_eq!(state.revision_count, 1);
    assert_eq!(state.max_revisions, 1);
    assert_eq!(state.approved, Some(true));
    assert!(state.validate_revision_count().is_ok());
}

#[tokio::test]
async fn test_invalid_decision_fails_the_run() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let state = start("wasm", 3);
    let id = state.workflow_id.clone();

    workflow.run_until_suspend(state).await.unwrap();
    let outcome = workflow.resume(&id, HumanInput::select(9)).await.unwrap();

    let RunOutcome::Failed(state) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0]
        .starts_with("Step 'user_selection' failed: ValidationError: Invalid selection: 9"));
    assert!(matches!(
        workflow.resume(&id, HumanInput::select(1)).await,
        Err(WorkflowError::SessionTerminal(_))
    ));
}

// ============================================================================
// Retry and failure conversion
// ============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (scout, calls) = FlakyStage::new(pipeline::SCOUT_TOPICS, 2, || {
        StepError::api("search", "rate limited")
    });
    let stages = ArticleStages {
        scout_topics: Arc::new(scout),
        ..ArticleStages::placeholder()
    };
    let workflow = article_workflow(stages).await;

    let suspension = expect_suspended(
        workflow.run_until_suspend(start("rust", 3)).await.unwrap(),
        pipeline::USER_SELECTION,
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(suspension.state.retry_count, 2);
    assert!(suspension.state.errors.is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_leave_one_error_entry() {
    let (research, calls) = FlakyStage::new(pipeline::RESEARCH_SECTIONS, usize::MAX, || {
        StepError::api("llm", "service unavailable")
    });
    let stages = ArticleStages {
        research_sections: Arc::new(research),
        ..ArticleStages::placeholder()
    };
    let sink = Arc::new(CollectingSink::default());
    let workflow = build_article_workflow(
        stages,
        &FAST_CONFIG,
        Arc::new(MemoryCheckpointStore::new()),
        sink.clone(),
    )
    .await
    .unwrap();

    let state = start("rust", 3);
    let id = state.workflow_id.clone();
    workflow.run_until_suspend(state).await.unwrap();
    let outcome = workflow.resume(&id, HumanInput::select(1)).await.unwrap();

    let RunOutcome::Failed(state) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        state.errors,
        vec!["Step 'research_sections' failed: ApiError: llm: service unavailable"]
    );
    // Nothing downstream ran
    assert!(!state.has_slot(Slot::WrittenSections));
    assert_eq!(
        sink.for_step(pipeline::RESEARCH_SECTIONS),
        vec![
            EventKind::Started,
            EventKind::Retrying,
            EventKind::Retrying,
            EventKind::Failed
        ]
    );
    assert_eq!(
        sink.for_step(pipeline::PLAN_STRUCTURE),
        vec![EventKind::Started, EventKind::Completed]
    );
}

#[tokio::test]
async fn test_validation_errors_are_not_retried() {
    let (analyze, calls) = FlakyStage::new(pipeline::ANALYZE_TRENDS, usize::MAX, || {
        StepError::missing_field("topic_candidates", "No topics to analyze")
    });
    let stages = ArticleStages {
        analyze_trends: Arc::new(analyze),
        ..ArticleStages::placeholder()
    };
    let workflow = article_workflow(stages).await;

    let outcome = workflow.run_until_suspend(start("rust", 3)).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcome.state().errors,
        vec!["Step 'analyze_trends' failed: ValidationError: No topics to analyze"]
    );
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_cancel_suspended_session() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let state = start("rust", 3);
    let id = state.workflow_id.clone();
    workflow.run_until_suspend(state).await.unwrap();

    let state = workflow.cancel(&id, "Topic selection cancelled by user").await.unwrap();
    assert_eq!(state.current_step, Cursor::Failed);
    assert_eq!(
        state.errors,
        vec!["Step 'user_selection' failed: Cancelled: Topic selection cancelled by user"]
    );

    let err = workflow.resume(&id, HumanInput::select(1)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionTerminal(_)));
}

#[tokio::test]
async fn test_file_checkpoints_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        checkpoint_dir: dir.path().to_path_buf(),
        ..FAST_CONFIG.clone()
    };
    let first = file_workflow(&config).await;
    let suspension = expect_suspended(
        first
            .run_until_suspend_with_key("session-7", start("rust", 3))
            .await
            .unwrap(),
        pipeline::USER_SELECTION,
    );
    drop(first);

    let store = FileCheckpointStore::new(dir.path());
    assert_eq!(store.list().await.unwrap(), vec!["session-7"]);
    assert_eq!(store.load("session-7").await.unwrap().state, suspension.state);

    let second = file_workflow(&config).await;
    let approval = expect_suspended(
        second
            .resume("session-7", HumanInput::select(1))
            .await
            .unwrap(),
        pipeline::USER_APPROVAL,
    );
    assert_eq!(approval.session_key, "session-7");
    assert_eq!(approval.state.workflow_id, suspension.state.workflow_id);
}

// ============================================================================
// Interactive driver
// ============================================================================

#[tokio::test]
async fn test_drive_with_scripted_decisions() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let channel = ScriptedInput::new([
        HumanInput::select(1),
        HumanInput::revise("more detail"),
        HumanInput::approve(),
    ]);
    let fallback = Arc::new(ScriptedInput::default());

    let state = drive(&workflow, "driven", start("rust", 3), &channel, fallback)
        .await
        .unwrap();
    assert_eq!(state.current_step, Cursor::Completed);
    assert_eq!(state.revision_count, 1);
    assert_eq!(channel.remaining(), 0);
}

#[tokio::test]
async fn test_drive_cancels_when_input_runs_out() {
    let workflow = article_workflow(ArticleStages::placeholder()).await;
    let channel = ScriptedInput::new([HumanInput::select(2)]);
    let fallback = Arc::new(ScriptedInput::default());

    let state = drive(&workflow, "abandoned", start("rust", 3), &channel, fallback)
        .await
        .unwrap();
    assert_eq!(state.current_step, Cursor::Failed);
    assert_eq!(
        state.errors,
        vec!["Step 'user_approval' failed: Cancelled: No scripted input left"]
    );
    assert!(matches!(
        workflow.resume("abandoned", HumanInput::approve()).await,
        Err(WorkflowError::SessionTerminal(_))
    ));
}
