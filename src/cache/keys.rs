//! Cache key definitions
//!
//! A cached query is identified by the (scope, viewer, params) triple.
//! The same query issued for two different viewers must never share an
//! entry, so the viewer is part of the key, not part of the params.

use std::fmt;

/// Cache key for one gateway query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Collection scope, e.g. "events" or "my-submissions"
    pub scope: String,
    /// Viewer id for viewer-scoped queries, None for shared ones
    pub viewer: Option<String>,
    /// Fingerprint of the serialized query parameters
    pub params_hash: String,
}

impl QueryKey {
    /// Key for a shared (viewer-independent) query
    pub fn shared(scope: &str, params: &str) -> Self {
        Self::build(scope, None, params)
    }

    /// Key for a viewer-scoped query
    pub fn for_viewer(scope: &str, viewer: &str, params: &str) -> Self {
        Self::build(scope, Some(viewer.to_string()), params)
    }

    fn build(scope: &str, viewer: Option<String>, params: &str) -> Self {
        // Hash the params for a shorter key
        let params_hash = if params.is_empty() {
            "empty".to_string()
        } else {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(params.as_bytes());
            let hash = hasher.finalize();
            hex::encode(&hash[..8]) // First 8 bytes = 16 hex chars
        };

        Self {
            scope: scope.to_string(),
            viewer,
            params_hash,
        }
    }

    /// Convert to storage key string
    pub fn to_storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.scope,
            self.viewer.as_deref().unwrap_or("anon"),
            self.params_hash
        )
    }

    /// Prefix matching every key in a scope
    pub fn scope_pattern(scope: &str) -> String {
        format!("{}:", scope)
    }

    /// Prefix matching one viewer's keys in a scope
    pub fn viewer_pattern(scope: &str, viewer: &str) -> String {
        format!("{}:{}:", scope, viewer)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]({})",
            self.scope,
            self.viewer.as_deref().unwrap_or("-"),
            self.params_hash
        )
    }
}
