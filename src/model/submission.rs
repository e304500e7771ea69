//! Research submissions
//!
//! Member-uploaded research that sits in a moderation queue: rows are
//! created `pending`, admins move them to `approved` or `rejected`, and
//! only approved rows reach the public feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "approved" => Some(SubmissionStatus::Approved),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

fn default_status() -> SubmissionStatus {
    SubmissionStatus::Pending
}

/// A submission row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSubmission {
    #[serde(default)]
    pub id: String,
    pub author_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub submission_type: String,
    #[serde(default = "default_status")]
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// An uploaded file attached to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub url: String,
    pub name: String,
    pub size: i64,
}

/// Fields a member supplies when submitting research
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub title: String,
    pub description: Option<String>,
    pub submission_type: String,
    pub tags: Vec<String>,
    pub file: Option<StoredFile>,
}

/// Fields a member may change on their own submission
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl SubmissionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.submission_type.is_none()
            && self.tags.is_none()
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }
}
