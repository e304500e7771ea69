//! Events and registrations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An event row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    /// Denormalized attendee count maintained by the backend
    #[serde(default)]
    pub registration_count: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// At or over capacity. Advisory: the backend is the arbiter, and a
    /// registration racing the last seat may still land.
    pub fn is_full(&self) -> bool {
        matches!(self.max_attendees, Some(max) if self.registration_count >= max)
    }

    /// Whether registration is still worth offering at `now`
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        if self.is_full() {
            return false;
        }
        if let Some(deadline) = self.registration_deadline {
            if now > deadline {
                return false;
            }
        }
        now < self.start_date
    }
}

/// One attendee on one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRegistration {
    #[serde(default)]
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// An event annotated with the viewer's registration state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub is_registered: bool,
}

impl EventView {
    pub fn with_registrations(event: Event, registered: &HashSet<String>) -> Self {
        let is_registered = registered.contains(&event.id);
        Self {
            event,
            is_registered,
        }
    }
}
