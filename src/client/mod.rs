//! Hub client
//!
//! The one handle application code holds. Reads go through the query
//! cache, writes go straight to the gateway and then run the
//! invalidation rules, and the session travels with every clone.

pub mod files;
pub mod mutations;
pub mod queries;

pub use queries::{EventFilter, ProfileFilter, QuestionFilter, ResourceFilter, SubmissionFilter};

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{default_rules, QueryCache, ScopeRules};
use crate::config::HubConfig;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::session::{Identity, Role, Session, SessionStore};

/// Client for the community hub's data layer.
///
/// Cloning is cheap and every clone shares the same cache, session,
/// and gateway.
#[derive(Clone)]
pub struct HubClient {
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) cache: Arc<QueryCache>,
    pub(crate) session: SessionStore,
    pub(crate) rules: Arc<ScopeRules>,
}

impl HubClient {
    /// Client over the hosted HTTP gateway
    #[cfg(feature = "http")]
    pub fn new(config: HubConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(crate::error::HubError::Config(
                "base_url must not be empty".to_string(),
            ));
        }
        let gateway = Arc::new(crate::gateway::HttpGateway::new(&config));
        Ok(Self::with_gateway(gateway, config))
    }

    /// Client over any gateway implementation
    pub fn with_gateway(gateway: Arc<dyn Gateway>, config: HubConfig) -> Self {
        Self {
            gateway,
            cache: Arc::new(QueryCache::new(config.cache)),
            session: SessionStore::new(),
            rules: Arc::new(default_rules()),
        }
    }

    /// Exchange credentials for a session. The role claim defaults to
    /// member when the auth provider attaches none.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let auth = self.gateway.sign_in(email, password).await?;
        let role = Role::parse(auth.role.as_deref().unwrap_or("member"));
        let identity = Identity {
            user_id: auth.user_id,
            email: auth.email,
            role,
        };

        self.gateway.set_auth(Some(auth.access_token.clone())).await;
        self.session
            .set(Session {
                identity: identity.clone(),
                access_token: auth.access_token,
                expires_at: auth.expires_at,
            })
            .await;

        info!(user_id = %identity.user_id, role = %identity.role, "Signed in");
        Ok(identity)
    }

    /// Drop the session and every cached read. Token revocation is
    /// best-effort; local state clears either way.
    pub async fn sign_out(&self) {
        let token = self.session.access_token().await;

        self.gateway.set_auth(None).await;
        self.session.clear().await;
        self.cache.clear();

        if let Some(token) = token {
            if let Err(err) = self.gateway.sign_out(&token).await {
                warn!(error = %err, "Token revocation failed during sign-out");
            }
        }
        info!("Signed out");
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Run the invalidation rules for a completed mutation
    pub(crate) async fn apply_mutation(&self, mutation: &str) {
        let viewer = self.session.viewer_id().await;
        for scope in self.rules.invalidations(mutation) {
            if self.rules.is_viewer_scoped(scope) {
                if let Some(viewer) = viewer.as_deref() {
                    self.cache.invalidate_viewer_scope(scope, viewer);
                }
            } else {
                self.cache.invalidate_scope(scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{mutations, scopes, QueryKey};
    use crate::gateway::MemoryGateway;
    use crate::session::Role;
    use serde_json::json;

    fn client_with(gateway: MemoryGateway) -> HubClient {
        HubClient::with_gateway(Arc::new(gateway), HubConfig::default())
    }

    #[tokio::test]
    async fn test_sign_in_establishes_session() {
        let client = client_with(
            MemoryGateway::new().with_user("u1", "admin@example.org", "pw", Some("admin")),
        );

        let identity = client.sign_in("admin@example.org", "pw").await.unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(client.session().viewer_id().await.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_sign_in_without_role_claim_is_member() {
        let client =
            client_with(MemoryGateway::new().with_user("u1", "member@example.org", "pw", None));

        let identity = client.sign_in("member@example.org", "pw").await.unwrap();
        assert_eq!(identity.role, Role::Member);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_and_cache() {
        let client = client_with(
            MemoryGateway::new().with_user("u1", "member@example.org", "pw", None),
        );
        client.sign_in("member@example.org", "pw").await.unwrap();

        let key = QueryKey::shared(scopes::EVENTS, "");
        client.cache().insert(&key, json!(["cached"]), None);

        client.sign_out().await;

        assert!(!client.session().is_signed_in().await);
        assert!(client.cache().get(&key).is_none());
    }

    #[tokio::test]
    async fn test_apply_mutation_follows_rules() {
        let client = client_with(
            MemoryGateway::new().with_user("u1", "member@example.org", "pw", None),
        );
        client.sign_in("member@example.org", "pw").await.unwrap();

        let shared = QueryKey::shared(scopes::SUBMISSIONS, "");
        let mine = QueryKey::for_viewer(scopes::MY_SUBMISSIONS, "u1", "");
        let other = QueryKey::for_viewer(scopes::MY_SUBMISSIONS, "u2", "");
        let events = QueryKey::shared(scopes::EVENTS, "");
        client.cache().insert(&shared, json!([]), None);
        client.cache().insert(&mine, json!([]), None);
        client.cache().insert(&other, json!([]), None);
        client.cache().insert(&events, json!([]), None);

        client.apply_mutation(mutations::SUBMISSION_CREATE).await;

        assert!(client.cache().get(&shared).is_none());
        assert!(client.cache().get(&mine).is_none());
        assert!(client.cache().get(&other).is_some(), "other viewers keep their entries");
        assert!(client.cache().get(&events).is_some(), "unrelated scopes keep theirs");
    }

    #[tokio::test]
    async fn test_profile_delete_mutation_touches_nothing() {
        let client = client_with(MemoryGateway::new());
        let profiles = QueryKey::shared(scopes::PROFILES, "");
        client.cache().insert(&profiles, json!(["cards"]), None);

        client.apply_mutation(mutations::PROFILE_DELETE).await;

        assert!(client.cache().get(&profiles).is_some());
    }
}
