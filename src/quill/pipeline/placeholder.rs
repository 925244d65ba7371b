// SPDX-License-Identifier: MIT

//! Deterministic stand-ins for the content stages.
//!
//! Each one reads the slots its real counterpart would read and writes the
//! slot it would produce, derived from the query and the selected topic.
//! Used for dry runs and tests.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    ANALYZE_TRENDS, PLAN_STRUCTURE, RESEARCH_SECTIONS, REVIEW_ARTICLE, REVISE_ARTICLE,
    SAVE_ARTICLE, SCOUT_TOPICS, WRITE_SECTIONS,
};
use crate::kit::error::StepError;
use crate::kit::step::Step;
use crate::quill::workflow::state::{Slot, StateUpdate, WorkflowState};

const SECTIONS: [&str; 3] = ["Introduction", "Core Concepts", "Conclusion"];

#[derive(Debug, Clone, Copy)]
pub struct PlaceholderStage {
    name: &'static str,
}

impl PlaceholderStage {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Step for PlaceholderStage {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateUpdate, StepError> {
        let update = StateUpdate::new();
        let query = state.input_query.as_str();

        Ok(match self.name {
            SCOUT_TOPICS => update.with_slot(
                Slot::TopicCandidates,
                json!([
                    {"topic": format!("{} fundamentals", query), "source": "placeholder"},
                    {"topic": format!("{} in production", query), "source": "placeholder"},
                    {"topic": format!("{} pitfalls", query), "source": "placeholder"},
                ]),
            ),
            ANALYZE_TRENDS => {
                let candidates = array(state, Slot::TopicCandidates)?;
                let scored: Vec<Value> = candidates
                    .iter()
                    .enumerate()
                    .map(|(rank, candidate)| {
                        json!({
                            "topic": candidate["topic"],
                            "score": 9.0 - rank as f64,
                            "reasoning": format!("Ranked #{} for '{}'", rank + 1, query),
                        })
                    })
                    .collect();
                update.with_slot(Slot::ScoredTopics, Value::Array(scored))
            }
            PLAN_STRUCTURE => {
                let topic = selected_topic(state)?;
                update.with_slot(
                    Slot::Outline,
                    json!({"title": topic, "sections": SECTIONS}),
                )
            }
            RESEARCH_SECTIONS => {
                let outline = state.require_slot(Slot::Outline)?;
                let dossiers: Vec<Value> = sections(outline)
                    .map(|section| {
                        json!({"section": section, "notes": format!("Notes on {}", section)})
                    })
                    .collect();
                update.with_slot(Slot::ResearchDossiers, Value::Array(dossiers))
            }
            WRITE_SECTIONS => {
                let written: Vec<Value> = array(state, Slot::ResearchDossiers)?
                    .iter()
                    .map(|dossier| {
                        json!({
                            "heading": dossier["section"],
                            "content": format!("Draft based on: {}", text(&dossier["notes"])),
                        })
                    })
                    .collect();
                update.with_slot(Slot::WrittenSections, Value::Array(written))
            }
            REVIEW_ARTICLE => {
                let topic = selected_topic(state)?;
                let content = match state.get_slot(Slot::RevisedArticle) {
                    Some(revised) => text(&revised["content"]),
                    None => array(state, Slot::WrittenSections)?
                        .iter()
                        .map(|section| {
                            format!(
                                "## {}\n\n{}",
                                text(&section["heading"]),
                                text(&section["content"])
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                };
                update.with_slot(
                    Slot::ReviewedArticle,
                    json!({
                        "seo_title": topic,
                        "seo_subtitle": format!("A practical look at {}", query),
                        "tags": [query],
                        "word_count": content.split_whitespace().count(),
                        "readability_score": 60.0,
                        "polished_content": content,
                        "revision": state.revision_count,
                    }),
                )
            }
            REVISE_ARTICLE => {
                let reviewed = state.require_slot(Slot::ReviewedArticle)?;
                let feedback = state.feedback.clone().unwrap_or_default();
                update.with_slot(
                    Slot::RevisedArticle,
                    json!({
                        "content": format!(
                            "{}\n\nRevised per feedback: {}",
                            text(&reviewed["polished_content"]),
                            feedback
                        ),
                        "feedback": feedback,
                    }),
                )
            }
            SAVE_ARTICLE => {
                let article = state.require_slot(Slot::ReviewedArticle)?.clone();
                let topic = selected_topic(state)?;
                update
                    .with_slot(Slot::ArticleId, json!(format!("article-{}", state.workflow_id)))
                    .with_slot(Slot::TopicId, json!(slug(topic)))
                    .with_slot(Slot::FinalArticle, article)
            }
            _ => update,
        })
    }
}

fn array(state: &WorkflowState, slot: Slot) -> Result<&Vec<Value>, StepError> {
    state
        .require_slot(slot)?
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| StepError::missing_field(slot.as_str(), format!("No {} to process", slot)))
}

fn selected_topic(state: &WorkflowState) -> Result<&str, StepError> {
    state
        .selected_topic
        .as_deref()
        .ok_or_else(|| StepError::missing_field("selected_topic", "No selected_topic in state"))
}

fn sections(outline: &Value) -> impl Iterator<Item = String> + '_ {
    outline["sections"]
        .as_array()
        .into_iter()
        .flatten()
        .map(text)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn slug(topic: &str) -> String {
    topic
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
