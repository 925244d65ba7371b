// SPDX-License-Identifier: MIT

//! Shape of the workflow state: the step cursor and the named output slots

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a workflow instance stands.
///
/// Serialized as a plain string: `"pending"`, `"completed"`, `"failed"`,
/// or the name of the next step to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cursor {
    /// Created but not yet positioned at the graph's entry step
    Pending,
    Step(String),
    Completed,
    Failed,
}

impl Cursor {
    pub const PENDING: &'static str = "pending";
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";

    pub fn step(name: impl Into<String>) -> Self {
        Self::Step(name.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Cursor::Completed | Cursor::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Cursor::Pending => Self::PENDING,
            Cursor::Step(name) => name,
            Cursor::Completed => Self::COMPLETED,
            Cursor::Failed => Self::FAILED,
        }
    }

    /// Names that cannot be used for steps
    pub fn is_reserved(name: &str) -> bool {
        matches!(name, Self::PENDING | Self::COMPLETED | Self::FAILED)
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::PENDING => Cursor::Pending,
            Self::COMPLETED => Cursor::Completed,
            Self::FAILED => Cursor::Failed,
            _ => Cursor::Step(s),
        }
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor::from(s.to_string())
    }
}

impl From<Cursor> for String {
    fn from(c: Cursor) -> Self {
        match c {
            Cursor::Step(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional outputs filled in progressively by the content stages.
/// Presence of a slot means the stage that produces it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    TopicCandidates,
    ScoredTopics,
    Outline,
    ResearchDossiers,
    WrittenSections,
    ReviewedArticle,
    RevisedArticle,
    ArticleId,
    TopicId,
    FinalArticle,
}

impl Slot {
    pub const ALL: [Slot; 10] = [
        Slot::TopicCandidates,
        Slot::ScoredTopics,
        Slot::Outline,
        Slot::ResearchDossiers,
        Slot::WrittenSections,
        Slot::ReviewedArticle,
        Slot::RevisedArticle,
        Slot::ArticleId,
        Slot::TopicId,
        Slot::FinalArticle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::TopicCandidates => "topic_candidates",
            Slot::ScoredTopics => "scored_topics",
            Slot::Outline => "outline",
            Slot::ResearchDossiers => "research_dossiers",
            Slot::WrittenSections => "written_sections",
            Slot::ReviewedArticle => "reviewed_article",
            Slot::RevisedArticle => "revised_article",
            Slot::ArticleId => "article_id",
            Slot::TopicId => "topic_id",
            Slot::FinalArticle => "final_article",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
