//! Learning resources and bookmarks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of resource a row is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Workshop,
    Toolkit,
    Reading,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workshop" => Some(ResourceKind::Workshop),
            "toolkit" => Some(ResourceKind::Toolkit),
            "reading" => Some(ResourceKind::Reading),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Workshop => "workshop",
            ResourceKind::Toolkit => "toolkit",
            ResourceKind::Reading => "reading",
        }
    }
}

/// A resource row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resource_type: ResourceKind,
    /// Delivery format, e.g. "video" or "pdf"
    #[serde(default)]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// One saved resource for one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBookmark {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub resource_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}
