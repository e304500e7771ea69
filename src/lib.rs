//! Commonweal SDK - Community Hub Data Layer
//!
//! Client library for the Commonweal child-welfare research hub: a
//! member directory, a moderated research feed, a questions board,
//! event registration, and a bookmarkable resource library, all served
//! through one hosted Postgres gateway.
//!
//! # Architecture
//!
//! Reads flow through a keyed stale-while-revalidate cache: fresh
//! entries serve instantly, stale entries serve while one background
//! refresh runs, and concurrent readers of the same key share a single
//! request. Writes go straight to the gateway and then invalidate the
//! scopes a rules table says they touch, so the next read refetches.
//! The `MemoryGateway` backs tests and offline development with the
//! same contract as the HTTP gateway.
//!
//! # Example
//!
//! ```rust,ignore
//! use commonweal_sdk::{HubClient, HubConfig, EventFilter};
//!
//! let client = HubClient::new(HubConfig {
//!     base_url: "https://hub.example.org".into(),
//!     api_key: std::env::var("HUB_API_KEY")?,
//!     ..HubConfig::default()
//! })?;
//!
//! // Anonymous reads work; registration state is simply empty
//! let events = client.events(&EventFilter::default()).await?;
//!
//! // Sign in, then writes invalidate the right cached reads
//! client.sign_in("member@example.org", "password").await?;
//! client.register_for_event(&events[0].event.id).await?;
//! ```

// Query caching with scope invalidation rules
pub mod cache;

// The client: queries, mutations, file uploads
pub mod client;

// Configuration
pub mod config;

// Pure directory filtering and sorting
pub mod directory;

// Error types
pub mod error;

// Gateway trait plus HTTP and in-memory backends
pub mod gateway;

// Typed rows and projections
pub mod model;

// Session state
pub mod session;

// Re-export the client and its filters
pub use client::{
    EventFilter, HubClient, ProfileFilter, QuestionFilter, ResourceFilter, SubmissionFilter,
};
pub use client::files::{AVATAR_BUCKET, RESEARCH_BUCKET};

// Re-export configuration
pub use config::{CacheConfig, HubConfig};

// Re-export error types
pub use error::{HubError, Result};

// Re-export gateway types
#[cfg(feature = "http")]
pub use gateway::HttpGateway;
pub use gateway::{Filter, Gateway, MemoryGateway, OnConflict, Order, SelectQuery};

// Re-export cache types
pub use cache::{spawn_cleanup_task, CacheStats, QueryCache, QueryKey, ScopeRule, ScopeRules};

// Re-export model types
pub use model::{
    Event, EventRegistration, EventView, NewQuestion, NewSubmission, Profile, ProfileDetails,
    ProfileKind, QuestionStatus, Resource, ResourceBookmark, ResourceKind, ResearchQuestion,
    ResearchSubmission, StoredFile, SubmissionPatch, SubmissionStatus, UnifiedProfile,
};

// Re-export session types
pub use session::{Identity, Role, SessionStore};

// Re-export directory helpers
pub use directory::{filter_and_sort, DirectoryFilter, DirectorySort};
