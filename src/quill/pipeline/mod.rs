// SPDX-License-Identifier: MIT

//! The article pipeline
//!
//! Ten steps: eight content stages supplied by the caller as `ArticleStages`
//! plus the two engine-owned interaction steps. The graph runs linearly up
//! to approval, loops through revision and review until the article is
//! approved (or the revision cap forces approval), then saves.

mod approval;
mod placeholder;
mod revision;
mod selection;

pub use approval::ApprovalStep;
pub use placeholder::PlaceholderStage;
pub use revision::RevisionStep;
pub use selection::SelectionStep;

use std::sync::Arc;

use crate::kit::error::WorkflowError;
use crate::kit::events::EventSink;
use crate::kit::step::Step;
use crate::kit::wrappers::{compose, RetryPolicy};
use crate::quill::workflow::checkpoint::CheckpointStore;
use crate::quill::workflow::config::EngineConfig;
use crate::quill::workflow::graph::{ApprovalRouter, GraphBuilder, Workflow};
use crate::quill::workflow::registry::{StepDescriptor, StepRegistry};

pub const SCOUT_TOPICS: &str = "scout_topics";
pub const ANALYZE_TRENDS: &str = "analyze_trends";
pub const USER_SELECTION: &str = "user_selection";
pub const PLAN_STRUCTURE: &str = "plan_structure";
pub const RESEARCH_SECTIONS: &str = "research_sections";
pub const WRITE_SECTIONS: &str = "write_sections";
pub const REVIEW_ARTICLE: &str = "review_article";
pub const USER_APPROVAL: &str = "user_approval";
pub const REVISE_ARTICLE: &str = "revise_article";
pub const SAVE_ARTICLE: &str = "save_article";

/// Execution order of the first pass
pub const ARTICLE_STEPS: [&str; 10] = [
    SCOUT_TOPICS,
    ANALYZE_TRENDS,
    USER_SELECTION,
    PLAN_STRUCTURE,
    RESEARCH_SECTIONS,
    WRITE_SECTIONS,
    REVIEW_ARTICLE,
    USER_APPROVAL,
    REVISE_ARTICLE,
    SAVE_ARTICLE,
];

/// Bodies for the eight content stages
#[derive(Clone)]
pub struct ArticleStages {
    pub scout_topics: Arc<dyn Step>,
    pub analyze_trends: Arc<dyn Step>,
    pub plan_structure: Arc<dyn Step>,
    pub research_sections: Arc<dyn Step>,
    pub write_sections: Arc<dyn Step>,
    pub review_article: Arc<dyn Step>,
    pub revise_article: Arc<dyn Step>,
    pub save_article: Arc<dyn Step>,
}

impl ArticleStages {
    /// Deterministic stand-ins that fill every slot from the query
    pub fn placeholder() -> Self {
        let stage = |name: &'static str| -> Arc<dyn Step> { Arc::new(PlaceholderStage::new(name)) };
        Self {
            scout_topics: stage(SCOUT_TOPICS),
            analyze_trends: stage(ANALYZE_TRENDS),
            plan_structure: stage(PLAN_STRUCTURE),
            research_sections: stage(RESEARCH_SECTIONS),
            write_sections: stage(WRITE_SECTIONS),
            review_article: stage(REVIEW_ARTICLE),
            revise_article: stage(REVISE_ARTICLE),
            save_article: stage(SAVE_ARTICLE),
        }
    }
}

/// Wrap every pipeline step with retry, logging and error handling and
/// register it. The two interaction steps are registered as suspend points.
pub async fn register_article_steps(
    registry: &StepRegistry,
    stages: ArticleStages,
    policy: &RetryPolicy,
    sink: Arc<dyn EventSink>,
) -> Result<(), WorkflowError> {
    let ArticleStages {
        scout_topics,
        analyze_trends,
        plan_structure,
        research_sections,
        write_sections,
        review_article,
        revise_article,
        save_article,
    } = stages;

    let content = [
        (SCOUT_TOPICS, scout_topics),
        (ANALYZE_TRENDS, analyze_trends),
        (PLAN_STRUCTURE, plan_structure),
        (RESEARCH_SECTIONS, research_sections),
        (WRITE_SECTIONS, write_sections),
        (REVIEW_ARTICLE, review_article),
        (SAVE_ARTICLE, save_article),
    ];
    for (expected, body) in content {
        check_name(expected, &*body)?;
        let step = compose(body, policy.clone(), sink.clone());
        registry.register(StepDescriptor::new(step)).await?;
    }

    check_name(REVISE_ARTICLE, &*revise_article)?;
    let revision = compose(RevisionStep::new(revise_article), policy.clone(), sink.clone());
    registry.register(StepDescriptor::new(revision)).await?;

    for step in [
        compose(SelectionStep, policy.clone(), sink.clone()),
        compose(ApprovalStep, policy.clone(), sink.clone()),
    ] {
        registry
            .register(StepDescriptor::new(step).suspend_point())
            .await?;
    }
    Ok(())
}

fn check_name(expected: &str, body: &dyn Step) -> Result<(), WorkflowError> {
    if body.name() == expected {
        Ok(())
    } else {
        Err(WorkflowError::config(format!(
            "stage body for '{}' is named '{}'",
            expected,
            body.name()
        )))
    }
}

/// The article graph, ready to compile against a registry populated by
/// `register_article_steps`
pub fn article_graph() -> GraphBuilder {
    let builder = ARTICLE_STEPS
        .iter()
        .fold(GraphBuilder::new("article"), |builder, name| builder.add_step(*name));

    builder
        .add_edge(SCOUT_TOPICS, ANALYZE_TRENDS)
        .add_edge(ANALYZE_TRENDS, USER_SELECTION)
        .add_edge(USER_SELECTION, PLAN_STRUCTURE)
        .add_edge(PLAN_STRUCTURE, RESEARCH_SECTIONS)
        .add_edge(RESEARCH_SECTIONS, WRITE_SECTIONS)
        .add_edge(WRITE_SECTIONS, REVIEW_ARTICLE)
        .add_edge(REVIEW_ARTICLE, USER_APPROVAL)
        .add_conditional_edges(
            USER_APPROVAL,
            ApprovalRouter,
            &[
                (ApprovalRouter::APPROVE, SAVE_ARTICLE),
                (ApprovalRouter::REVISE, REVISE_ARTICLE),
            ],
        )
        .add_edge(REVISE_ARTICLE, REVIEW_ARTICLE)
        .set_entry(SCOUT_TOPICS)
        .set_finish(SAVE_ARTICLE)
        .interrupt_before(USER_SELECTION)
        .interrupt_before(USER_APPROVAL)
}

/// Register the stages, compile the article graph and wrap it in an
/// executor configured from `config`
pub async fn build_article_workflow(
    stages: ArticleStages,
    config: &EngineConfig,
    store: Arc<dyn CheckpointStore>,
    sink: Arc<dyn EventSink>,
) -> Result<Workflow, WorkflowError> {
    let registry = StepRegistry::new();
    register_article_steps(&registry, stages, &config.retry, sink).await?;
    let graph = article_graph().compile(&registry).await?;
    Ok(Workflow::new(graph, store).with_max_transitions(config.max_transitions))
}
