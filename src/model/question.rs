//! Research questions
//!
//! Open problems agencies and researchers post for the community to
//! pick up. Unlike submissions there is no moderation queue; the author
//! moves their question through its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a research question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    InProgress,
    Completed,
    Closed,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::InProgress => "in_progress",
            QuestionStatus::Completed => "completed",
            QuestionStatus::Closed => "closed",
        }
    }
}

fn default_status() -> QuestionStatus {
    QuestionStatus::Open
}

/// A question row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuestion {
    #[serde(default)]
    pub id: String,
    pub author_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: QuestionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// Populations the question concerns, e.g. "foster youth 14-18"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub populations: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when posting a question
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub title: String,
    pub description: Option<String>,
    pub topics: Vec<String>,
    pub populations: Vec<String>,
}
