//! Data model
//!
//! Typed views over the gateway's JSON rows. Wire rows are flat;
//! decoding lifts the per-kind profile columns into a tagged enum and
//! leaves everything else close to the table shape.

pub mod event;
pub mod profile;
pub mod question;
pub mod resource;
pub mod submission;

pub use event::{Event, EventRegistration, EventView};
pub use profile::{Profile, ProfileDetails, ProfileKind, ProfileRecord, UnifiedProfile};
pub use question::{NewQuestion, QuestionStatus, ResearchQuestion};
pub use resource::{Resource, ResourceBookmark, ResourceKind};
pub use submission::{
    NewSubmission, ResearchSubmission, StoredFile, SubmissionPatch, SubmissionStatus,
};

/// Table names on the hosted gateway
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const SUBMISSIONS: &str = "research_submissions";
    pub const QUESTIONS: &str = "research_questions";
    pub const EVENTS: &str = "events";
    pub const REGISTRATIONS: &str = "event_registrations";
    pub const RESOURCES: &str = "resources";
    pub const BOOKMARKS: &str = "resource_bookmarks";
}
