//! Query caching layer
//!
//! Stale-while-revalidate cache for gateway reads. Keys combine a scope
//! name, an optional viewer id, and a fingerprint of the query
//! parameters; the rules table says how long each scope stays fresh and
//! which mutations drop it.

pub mod keys;
pub mod rules;
pub mod store;

pub use keys::QueryKey;
pub use rules::{default_rules, mutations, scopes, ScopeRule, ScopeRules};
pub use store::{spawn_cleanup_task, CacheEntry, CacheStats, QueryCache};

pub use crate::config::CacheConfig;
