//! Scope rules
//!
//! Declares each query scope's freshness window and which mutations
//! invalidate it. The client consults this table after every write, so
//! adding a scope or a mutation is a one-line change here rather than
//! scattered invalidation calls.

use std::collections::HashMap;
use std::time::Duration;

/// Well-known query scope names
pub mod scopes {
    pub const PROFILES: &str = "profiles";
    pub const SUBMISSIONS: &str = "submissions";
    pub const MY_SUBMISSIONS: &str = "my-submissions";
    pub const QUESTIONS: &str = "questions";
    pub const MY_QUESTIONS: &str = "my-questions";
    pub const EVENTS: &str = "events";
    pub const EVENT: &str = "event";
    pub const MY_REGISTRATIONS: &str = "my-registrations";
    pub const RESOURCES: &str = "resources";
    pub const BOOKMARKS: &str = "bookmarks";
}

/// Well-known mutation names
pub mod mutations {
    pub const SUBMISSION_CREATE: &str = "submission.create";
    pub const SUBMISSION_UPDATE: &str = "submission.update";
    pub const SUBMISSION_DELETE: &str = "submission.delete";
    pub const SUBMISSION_REVIEW: &str = "submission.review";
    pub const QUESTION_CREATE: &str = "question.create";
    pub const QUESTION_SET_STATUS: &str = "question.set-status";
    pub const QUESTION_DELETE: &str = "question.delete";
    pub const EVENT_REGISTER: &str = "event.register";
    pub const EVENT_CANCEL: &str = "event.cancel";
    pub const BOOKMARK_TOGGLE: &str = "bookmark.toggle";
    pub const PROFILE_DELETE: &str = "profile.delete";
}

/// Cache behavior for one query scope
#[derive(Debug, Clone)]
pub struct ScopeRule {
    /// Scope name, the first segment of every storage key
    pub scope: String,
    /// Freshness window in seconds
    pub ttl_secs: u64,
    /// Keys in this scope carry the viewer id and invalidate per-viewer
    pub viewer_scoped: bool,
    /// Mutations that drop this scope's entries
    pub invalidated_by: Vec<String>,
}

impl ScopeRule {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            ttl_secs: 300,
            viewer_scoped: false,
            invalidated_by: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, secs: u64) -> Self {
        self.ttl_secs = secs;
        self
    }

    pub fn per_viewer(mut self) -> Self {
        self.viewer_scoped = true;
        self
    }

    pub fn invalidated_by(mut self, mutations: &[&str]) -> Self {
        self.invalidated_by = mutations.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// The full rules table plus its mutation-to-scopes reverse index
#[derive(Debug, Clone)]
pub struct ScopeRules {
    rules: HashMap<String, ScopeRule>,
    invalidation_map: HashMap<String, Vec<String>>,
}

impl ScopeRules {
    pub fn from_rules(rules: Vec<ScopeRule>) -> Self {
        let mut invalidation_map: HashMap<String, Vec<String>> = HashMap::new();
        for rule in &rules {
            for mutation in &rule.invalidated_by {
                invalidation_map
                    .entry(mutation.clone())
                    .or_default()
                    .push(rule.scope.clone());
            }
        }

        let rules = rules
            .into_iter()
            .map(|rule| (rule.scope.clone(), rule))
            .collect();

        Self {
            rules,
            invalidation_map,
        }
    }

    pub fn get(&self, scope: &str) -> Option<&ScopeRule> {
        self.rules.get(scope)
    }

    /// Freshness window for a scope, None for unknown scopes
    pub fn ttl_for(&self, scope: &str) -> Option<Duration> {
        self.rules.get(scope).map(|rule| rule.ttl_duration())
    }

    /// Scopes a mutation invalidates. Unknown mutations invalidate
    /// nothing.
    pub fn invalidations(&self, mutation: &str) -> &[String] {
        self.invalidation_map
            .get(mutation)
            .map(|scopes| scopes.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_viewer_scoped(&self, scope: &str) -> bool {
        self.rules
            .get(scope)
            .map(|rule| rule.viewer_scoped)
            .unwrap_or(false)
    }
}

impl Default for ScopeRules {
    fn default() -> Self {
        default_rules()
    }
}

/// The rules table for the hub's scopes.
///
/// Profile deletion is deliberately absent from every `invalidated_by`
/// list; the directory refreshes through an explicit refetch instead.
pub fn default_rules() -> ScopeRules {
    use mutations::*;
    use scopes::*;

    ScopeRules::from_rules(vec![
        ScopeRule::new(PROFILES),
        ScopeRule::new(SUBMISSIONS).invalidated_by(&[
            SUBMISSION_CREATE,
            SUBMISSION_UPDATE,
            SUBMISSION_DELETE,
            SUBMISSION_REVIEW,
        ]),
        ScopeRule::new(MY_SUBMISSIONS).per_viewer().invalidated_by(&[
            SUBMISSION_CREATE,
            SUBMISSION_UPDATE,
            SUBMISSION_DELETE,
            SUBMISSION_REVIEW,
        ]),
        ScopeRule::new(QUESTIONS).invalidated_by(&[
            QUESTION_CREATE,
            QUESTION_SET_STATUS,
            QUESTION_DELETE,
        ]),
        ScopeRule::new(MY_QUESTIONS).per_viewer().invalidated_by(&[
            QUESTION_CREATE,
            QUESTION_SET_STATUS,
            QUESTION_DELETE,
        ]),
        ScopeRule::new(EVENTS)
            .with_ttl(120)
            .invalidated_by(&[EVENT_REGISTER, EVENT_CANCEL]),
        ScopeRule::new(EVENT)
            .with_ttl(120)
            .invalidated_by(&[EVENT_REGISTER, EVENT_CANCEL]),
        ScopeRule::new(MY_REGISTRATIONS)
            .per_viewer()
            .invalidated_by(&[EVENT_REGISTER, EVENT_CANCEL]),
        ScopeRule::new(RESOURCES).with_ttl(600),
        ScopeRule::new(BOOKMARKS).per_viewer().invalidated_by(&[BOOKMARK_TOGGLE]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_invalidates_both_submission_scopes() {
        let rules = default_rules();
        let scopes = rules.invalidations(mutations::SUBMISSION_REVIEW);
        assert!(scopes.contains(&scopes::SUBMISSIONS.to_string()));
        assert!(scopes.contains(&scopes::MY_SUBMISSIONS.to_string()));
        assert_eq!(scopes.len(), 2);
    }

    #[test]
    fn test_registration_touches_event_scopes_only() {
        let rules = default_rules();
        let scopes = rules.invalidations(mutations::EVENT_REGISTER);
        assert!(scopes.contains(&scopes::EVENTS.to_string()));
        assert!(scopes.contains(&scopes::EVENT.to_string()));
        assert!(scopes.contains(&scopes::MY_REGISTRATIONS.to_string()));
        assert!(!scopes.contains(&scopes::SUBMISSIONS.to_string()));
    }

    #[test]
    fn test_profile_delete_invalidates_nothing() {
        let rules = default_rules();
        assert!(rules.invalidations(mutations::PROFILE_DELETE).is_empty());
    }

    #[test]
    fn test_unknown_mutation_invalidates_nothing() {
        let rules = default_rules();
        assert!(rules.invalidations("no.such.mutation").is_empty());
    }

    #[test]
    fn test_viewer_scoping() {
        let rules = default_rules();
        assert!(rules.is_viewer_scoped(scopes::BOOKMARKS));
        assert!(rules.is_viewer_scoped(scopes::MY_SUBMISSIONS));
        assert!(!rules.is_viewer_scoped(scopes::EVENTS));
        assert!(!rules.is_viewer_scoped("unknown"));
    }

    #[test]
    fn test_ttl_lookup() {
        let rules = default_rules();
        assert_eq!(rules.ttl_for(scopes::EVENTS), Some(Duration::from_secs(120)));
        assert_eq!(rules.ttl_for(scopes::PROFILES), Some(Duration::from_secs(300)));
        assert_eq!(rules.ttl_for("unknown"), None);
    }
}
