//! Read operations
//!
//! Every query funnels through `fetch_rows`: build a stable cache key
//! from the filter, let the cache serve or dedupe the gateway select,
//! then decode. Filters fingerprint as their JSON form, so the same
//! filter always lands on the same key.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::HubClient;
use crate::cache::{scopes, QueryKey};
use crate::error::{HubError, Result};
use crate::gateway::{Filter, Order, SelectQuery};
use crate::model::{
    tables, Event, EventRegistration, EventView, Profile, ProfileKind, ProfileRecord,
    QuestionStatus, Resource, ResourceBookmark, ResourceKind, ResearchQuestion,
    ResearchSubmission, SubmissionStatus, UnifiedProfile,
};

/// Directory filter. `kind` takes a discriminant or the `"all"`
/// sentinel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileFilter {
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionFilter {
    pub submission_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionFilter {
    pub status: Option<QuestionStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub featured: Option<bool>,
    /// Only events that have not started yet
    pub upcoming: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceFilter {
    pub kind: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
}

fn fingerprint<T: Serialize>(params: &T) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

fn decode_rows<T: DeserializeOwned>(rows: Value) -> Result<Vec<T>> {
    serde_json::from_value(rows).map_err(Into::into)
}

impl HubClient {
    /// Cached select. The key is built from the caller's filter, never
    /// from the materialized query, which may embed the current time.
    pub(crate) async fn fetch_rows(
        &self,
        scope: &str,
        viewer: Option<String>,
        params: String,
        table: &'static str,
        query: SelectQuery,
    ) -> Result<Value> {
        let key = match viewer {
            Some(viewer) => QueryKey::for_viewer(scope, &viewer, &params),
            None => QueryKey::shared(scope, &params),
        };
        let ttl = self.rules.ttl_for(scope);
        let gateway = Arc::clone(&self.gateway);

        self.cache
            .get_or_fetch(&key, ttl, move || async move {
                gateway.select(table, query).await.map(Value::Array)
            })
            .await
    }

    /// Profiles for the directory, newest first
    pub async fn profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>> {
        let mut query = SelectQuery::new().with_order(Order::desc("created_at"));

        if let Some(kind) = filter.kind.as_deref().filter(|k| *k != "all") {
            match ProfileKind::parse(kind) {
                Some(kind) => {
                    query = query.with_filter(Filter::eq("profile_type", kind.as_str()))
                }
                None => debug!(kind = kind, "Ignoring unrecognized profile kind filter"),
            }
        }

        let rows = self
            .fetch_rows(
                scopes::PROFILES,
                None,
                fingerprint(filter),
                tables::PROFILES,
                query,
            )
            .await?;
        let records: Vec<ProfileRecord> = decode_rows(rows)?;
        Ok(records.into_iter().map(Profile::from).collect())
    }

    /// One profile by id
    pub async fn profile(&self, id: &str) -> Result<Profile> {
        let params = serde_json::json!({ "id": id }).to_string();
        let query = SelectQuery::new()
            .with_filter(Filter::eq("id", id))
            .with_limit(1);

        let rows = self
            .fetch_rows(scopes::PROFILES, None, params, tables::PROFILES, query)
            .await?;
        let records: Vec<ProfileRecord> = decode_rows(rows)?;
        records
            .into_iter()
            .next()
            .map(Profile::from)
            .ok_or_else(|| HubError::NotFound(format!("profile {}", id)))
    }

    /// Directory cards: profiles flattened to the unified shape
    pub async fn unified_profiles(&self, filter: &ProfileFilter) -> Result<Vec<UnifiedProfile>> {
        let profiles = self.profiles(filter).await?;
        Ok(profiles.iter().map(UnifiedProfile::project).collect())
    }

    /// Drop cached directory reads and refetch. Callers use this after
    /// out-of-band profile changes, including admin deletion.
    pub async fn refresh_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>> {
        self.cache.invalidate_scope(scopes::PROFILES);
        self.profiles(filter).await
    }

    /// The public research feed: approved submissions, newest first
    pub async fn approved_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<ResearchSubmission>> {
        let mut query = SelectQuery::new()
            .with_filter(Filter::eq("status", SubmissionStatus::Approved.as_str()))
            .with_order(Order::desc("created_at"));

        if let Some(kind) = filter.submission_type.as_deref().filter(|k| *k != "all") {
            query = query.with_filter(Filter::eq("submission_type", kind));
        }

        let rows = self
            .fetch_rows(
                scopes::SUBMISSIONS,
                None,
                fingerprint(filter),
                tables::SUBMISSIONS,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// The signed-in member's own submissions, every status
    pub async fn my_submissions(&self) -> Result<Vec<ResearchSubmission>> {
        let identity = self.session.require().await?;
        let query = SelectQuery::new()
            .with_filter(Filter::eq("author_id", identity.user_id.as_str()))
            .with_order(Order::desc("created_at"));

        let rows = self
            .fetch_rows(
                scopes::MY_SUBMISSIONS,
                Some(identity.user_id),
                String::new(),
                tables::SUBMISSIONS,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// Admin review queue, optionally narrowed to one status
    pub async fn all_submissions(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<ResearchSubmission>> {
        self.session.require_admin().await?;

        let mut query = SelectQuery::new().with_order(Order::desc("created_at"));
        if let Some(status) = status {
            query = query.with_filter(Filter::eq("status", status.as_str()));
        }

        let params = serde_json::json!({
            "admin": true,
            "status": status.map(|s| s.as_str()),
        })
        .to_string();
        let rows = self
            .fetch_rows(scopes::SUBMISSIONS, None, params, tables::SUBMISSIONS, query)
            .await?;
        decode_rows(rows)
    }

    /// The community questions board, newest first
    pub async fn questions(&self, filter: &QuestionFilter) -> Result<Vec<ResearchQuestion>> {
        let mut query = SelectQuery::new().with_order(Order::desc("created_at"));
        if let Some(status) = filter.status {
            query = query.with_filter(Filter::eq("status", status.as_str()));
        }

        let rows = self
            .fetch_rows(
                scopes::QUESTIONS,
                None,
                fingerprint(filter),
                tables::QUESTIONS,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// The signed-in member's own questions
    pub async fn my_questions(&self) -> Result<Vec<ResearchQuestion>> {
        let identity = self.session.require().await?;
        let query = SelectQuery::new()
            .with_filter(Filter::eq("author_id", identity.user_id.as_str()))
            .with_order(Order::desc("created_at"));

        let rows = self
            .fetch_rows(
                scopes::MY_QUESTIONS,
                Some(identity.user_id),
                String::new(),
                tables::QUESTIONS,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// Events soonest-first, annotated with the viewer's registrations
    pub async fn events(&self, filter: &EventFilter) -> Result<Vec<EventView>> {
        let mut query = SelectQuery::new().with_order(Order::asc("start_date"));

        if let Some(event_type) = filter.event_type.as_deref().filter(|t| *t != "all") {
            query = query.with_filter(Filter::eq("event_type", event_type));
        }
        if let Some(featured) = filter.featured {
            query = query.with_filter(Filter::eq("featured", featured));
        }
        if filter.upcoming {
            query = query.with_filter(Filter::gte("start_date", Utc::now().to_rfc3339()));
        }

        let rows = self
            .fetch_rows(
                scopes::EVENTS,
                None,
                fingerprint(filter),
                tables::EVENTS,
                query,
            )
            .await?;
        let events: Vec<Event> = decode_rows(rows)?;

        let registered = self.registered_event_ids().await?;
        Ok(events
            .into_iter()
            .map(|event| EventView::with_registrations(event, &registered))
            .collect())
    }

    /// One event by id with the viewer's registration state
    pub async fn event(&self, id: &str) -> Result<EventView> {
        let params = serde_json::json!({ "id": id }).to_string();
        let query = SelectQuery::new()
            .with_filter(Filter::eq("id", id))
            .with_limit(1);

        let rows = self
            .fetch_rows(scopes::EVENT, None, params, tables::EVENTS, query)
            .await?;
        let events: Vec<Event> = decode_rows(rows)?;
        let event = events
            .into_iter()
            .next()
            .ok_or_else(|| HubError::NotFound(format!("event {}", id)))?;

        let registered = self.registered_event_ids().await?;
        Ok(EventView::with_registrations(event, &registered))
    }

    /// The viewer's registrations, newest first
    pub async fn my_registrations(&self) -> Result<Vec<EventRegistration>> {
        let identity = self.session.require().await?;
        let query = SelectQuery::new()
            .with_filter(Filter::eq("user_id", identity.user_id.as_str()))
            .with_order(Order::desc("created_at"));

        let rows = self
            .fetch_rows(
                scopes::MY_REGISTRATIONS,
                Some(identity.user_id),
                String::new(),
                tables::REGISTRATIONS,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// Ids of events the viewer is registered for. Empty when signed
    /// out.
    pub async fn registered_event_ids(&self) -> Result<HashSet<String>> {
        match self.my_registrations().await {
            Ok(registrations) => Ok(registrations
                .into_iter()
                .map(|registration| registration.event_id)
                .collect()),
            Err(HubError::AuthRequired) => Ok(HashSet::new()),
            Err(err) => Err(err),
        }
    }

    /// The resource library, featured first then newest
    pub async fn resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>> {
        let mut query = SelectQuery::new()
            .with_order(Order::desc("featured"))
            .with_order(Order::desc("created_at"));

        if let Some(kind) = filter.kind.as_deref().filter(|k| *k != "all") {
            match ResourceKind::parse(kind) {
                Some(kind) => {
                    query = query.with_filter(Filter::eq("resource_type", kind.as_str()))
                }
                None => debug!(kind = kind, "Ignoring unrecognized resource kind filter"),
            }
        }
        if let Some(category) = filter.category.as_deref().filter(|c| *c != "all") {
            query = query.with_filter(Filter::eq("category", category));
        }
        if let Some(featured) = filter.featured {
            query = query.with_filter(Filter::eq("featured", featured));
        }

        let rows = self
            .fetch_rows(
                scopes::RESOURCES,
                None,
                fingerprint(filter),
                tables::RESOURCES,
                query,
            )
            .await?;
        decode_rows(rows)
    }

    /// Ids of resources the viewer has bookmarked. Empty when signed
    /// out.
    pub async fn bookmarked_resource_ids(&self) -> Result<HashSet<String>> {
        let viewer = match self.session.viewer_id().await {
            Some(viewer) => viewer,
            None => return Ok(HashSet::new()),
        };

        let query = SelectQuery::new().with_filter(Filter::eq("user_id", viewer.as_str()));
        let rows = self
            .fetch_rows(
                scopes::BOOKMARKS,
                Some(viewer),
                String::new(),
                tables::BOOKMARKS,
                query,
            )
            .await?;
        let bookmarks: Vec<ResourceBookmark> = decode_rows(rows)?;
        Ok(bookmarks
            .into_iter()
            .map(|bookmark| bookmark.resource_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::gateway::MemoryGateway;
    use serde_json::json;

    fn client_over(gateway: MemoryGateway) -> (HubClient, Arc<MemoryGateway>) {
        let gateway = Arc::new(gateway);
        let client = HubClient::with_gateway(gateway.clone(), HubConfig::default());
        (client, gateway)
    }

    fn seeded_profiles() -> MemoryGateway {
        MemoryGateway::new().with_rows(
            "profiles",
            vec![
                json!({
                    "id": "p1", "profile_type": "student", "name": "Dana",
                    "university": "State", "major": "Social Work",
                    "created_at": "2026-01-01T00:00:00Z"
                }),
                json!({
                    "id": "p2", "profile_type": "agency", "name": "Bright Futures",
                    "agency_type": "Nonprofit", "focus_areas": ["adoption"],
                    "created_at": "2026-02-01T00:00:00Z"
                }),
            ],
        )
    }

    #[tokio::test]
    async fn test_profiles_newest_first() {
        let (client, _) = client_over(seeded_profiles());

        let profiles = client.profiles(&ProfileFilter::default()).await.unwrap();
        let ids: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_profile_kind_filter() {
        let (client, _) = client_over(seeded_profiles());

        let filter = ProfileFilter {
            kind: Some("agency".to_string()),
        };
        let cards = client.unified_profiles(&filter).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].organization, "Bright Futures");
    }

    #[tokio::test]
    async fn test_unrecognized_kind_filter_ignored() {
        let (client, _) = client_over(seeded_profiles());

        let filter = ProfileFilter {
            kind: Some("martian".to_string()),
        };
        assert_eq!(client.profiles(&filter).await.unwrap().len(), 2);

        let all = ProfileFilter {
            kind: Some("all".to_string()),
        };
        assert_eq!(client.profiles(&all).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_reads_hit_cache() {
        let (client, gateway) = client_over(seeded_profiles());

        client.profiles(&ProfileFilter::default()).await.unwrap();
        let after_first = gateway.call_count();
        client.profiles(&ProfileFilter::default()).await.unwrap();

        assert_eq!(gateway.call_count(), after_first);
    }

    #[tokio::test]
    async fn test_profile_lookup_not_found() {
        let (client, _) = client_over(seeded_profiles());

        assert!(client.profile("p1").await.is_ok());
        assert!(matches!(
            client.profile("missing").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_approved_feed_excludes_pending() {
        let (client, _) = client_over(MemoryGateway::new().with_rows(
            "research_submissions",
            vec![
                json!({"id": "s1", "author_id": "u1", "title": "A", "submission_type": "article", "status": "approved"}),
                json!({"id": "s2", "author_id": "u1", "title": "B", "submission_type": "article", "status": "pending"}),
            ],
        ));

        let feed = client
            .approved_submissions(&SubmissionFilter::default())
            .await
            .unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, "s1");
    }

    #[tokio::test]
    async fn test_my_submissions_requires_auth() {
        let (client, gateway) = client_over(MemoryGateway::new());

        assert!(matches!(
            client.my_submissions().await,
            Err(HubError::AuthRequired)
        ));
        assert_eq!(gateway.call_count(), 0, "the check happens before any request");
    }

    #[tokio::test]
    async fn test_all_submissions_requires_admin() {
        let (client, _) = client_over(
            MemoryGateway::new().with_user("u1", "member@example.org", "pw", None),
        );
        client.sign_in("member@example.org", "pw").await.unwrap();

        assert!(matches!(
            client.all_submissions(None).await,
            Err(HubError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_events_annotated_with_registration() {
        let (client, _) = client_over(
            MemoryGateway::new()
                .with_user("u1", "member@example.org", "pw", None)
                .with_rows(
                    "events",
                    vec![
                        json!({"id": "e1", "title": "A", "event_type": "workshop", "start_date": "2099-01-01T00:00:00Z"}),
                        json!({"id": "e2", "title": "B", "event_type": "webinar", "start_date": "2099-02-01T00:00:00Z"}),
                    ],
                )
                .with_rows(
                    "event_registrations",
                    vec![json!({"id": "reg1", "event_id": "e2", "user_id": "u1"})],
                ),
        );
        client.sign_in("member@example.org", "pw").await.unwrap();

        let events = client.events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_registered);
        assert!(events[1].is_registered);
    }

    #[tokio::test]
    async fn test_anonymous_events_have_no_registrations() {
        let (client, _) = client_over(MemoryGateway::new().with_rows(
            "events",
            vec![json!({"id": "e1", "title": "A", "event_type": "workshop", "start_date": "2099-01-01T00:00:00Z"})],
        ));

        let events = client.events(&EventFilter::default()).await.unwrap();
        assert!(!events[0].is_registered);
    }

    #[tokio::test]
    async fn test_upcoming_filter_drops_past_events() {
        let (client, _) = client_over(MemoryGateway::new().with_rows(
            "events",
            vec![
                json!({"id": "past", "title": "P", "event_type": "workshop", "start_date": "2020-01-01T00:00:00Z"}),
                json!({"id": "future", "title": "F", "event_type": "workshop", "start_date": "2099-01-01T00:00:00Z"}),
            ],
        ));

        let filter = EventFilter {
            upcoming: true,
            ..EventFilter::default()
        };
        let events = client.events(&filter).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.id, "future");
    }

    #[tokio::test]
    async fn test_event_detail_not_found() {
        let (client, _) = client_over(MemoryGateway::new());

        assert!(matches!(
            client.event("missing").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resources_featured_first() {
        let (client, _) = client_over(MemoryGateway::new().with_rows(
            "resources",
            vec![
                json!({"id": "r1", "title": "A", "resource_type": "toolkit", "featured": false, "created_at": "2026-02-01T00:00:00Z"}),
                json!({"id": "r2", "title": "B", "resource_type": "reading", "featured": true, "created_at": "2026-01-01T00:00:00Z"}),
            ],
        ));

        let resources = client.resources(&ResourceFilter::default()).await.unwrap();
        let ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn test_anonymous_bookmark_ids_skip_the_gateway() {
        let (client, gateway) = client_over(MemoryGateway::new());

        let ids = client.bookmarked_resource_ids().await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(gateway.call_count(), 0);
    }
}
