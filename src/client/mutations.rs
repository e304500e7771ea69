//! Write operations
//!
//! Writes go straight to the gateway, never through the cache. After a
//! successful write the mutation name runs through the rules table and
//! the affected scopes drop, so the next read refetches.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::HubClient;
use crate::cache::mutations;
use crate::error::{HubError, Result};
use crate::gateway::{Filter, OnConflict, SelectQuery};
use crate::model::{
    tables, NewQuestion, NewSubmission, QuestionStatus, ResearchQuestion, ResearchSubmission,
    SubmissionPatch, SubmissionStatus,
};

fn require_row(row: Option<Value>) -> Result<Value> {
    row.ok_or_else(|| HubError::Gateway {
        status: 500,
        message: "insert returned no row".to_string(),
    })
}

impl HubClient {
    /// Submit research for review. New rows enter the queue as pending
    /// regardless of caller input.
    pub async fn create_submission(&self, new: NewSubmission) -> Result<ResearchSubmission> {
        let identity = self.session.require().await?;

        let mut row = json!({
            "author_id": identity.user_id,
            "title": new.title,
            "description": new.description,
            "submission_type": new.submission_type,
            "tags": new.tags,
            "status": SubmissionStatus::Pending.as_str(),
        });
        if let Some(file) = new.file {
            row["file_url"] = json!(file.url);
            row["file_name"] = json!(file.name);
            row["file_size"] = json!(file.size);
        }

        let stored = self
            .gateway
            .insert(tables::SUBMISSIONS, row, OnConflict::Error)
            .await?;
        self.apply_mutation(mutations::SUBMISSION_CREATE).await;

        let submission: ResearchSubmission = serde_json::from_value(require_row(stored)?)?;
        info!(submission_id = %submission.id, "Submission created");
        Ok(submission)
    }

    /// Edit your own submission. Empty patches are rejected before any
    /// request goes out.
    pub async fn update_submission(&self, id: &str, patch: SubmissionPatch) -> Result<()> {
        let identity = self.session.require().await?;
        if patch.is_empty() {
            return Err(HubError::InvalidInput("empty submission patch".to_string()));
        }

        self.gateway
            .update(
                tables::SUBMISSIONS,
                serde_json::to_value(&patch)?,
                vec![
                    Filter::eq("id", id),
                    Filter::eq("author_id", identity.user_id.as_str()),
                ],
            )
            .await?;
        self.apply_mutation(mutations::SUBMISSION_UPDATE).await;
        info!(submission_id = id, "Submission updated");
        Ok(())
    }

    /// Admin review: move a submission to approved or rejected
    pub async fn review_submission(&self, id: &str, status: SubmissionStatus) -> Result<()> {
        self.session.require_admin().await?;

        self.gateway
            .update(
                tables::SUBMISSIONS,
                json!({ "status": status.as_str() }),
                vec![Filter::eq("id", id)],
            )
            .await?;
        self.apply_mutation(mutations::SUBMISSION_REVIEW).await;
        info!(
            submission_id = id,
            status = status.as_str(),
            "Submission reviewed"
        );
        Ok(())
    }

    pub async fn delete_submission(&self, id: &str) -> Result<()> {
        self.session.require_admin().await?;

        self.gateway
            .delete(tables::SUBMISSIONS, vec![Filter::eq("id", id)])
            .await?;
        self.apply_mutation(mutations::SUBMISSION_DELETE).await;
        info!(submission_id = id, "Submission deleted");
        Ok(())
    }

    /// Post a question. New questions always start open.
    pub async fn create_question(&self, new: NewQuestion) -> Result<ResearchQuestion> {
        let identity = self.session.require().await?;

        let row = json!({
            "author_id": identity.user_id,
            "title": new.title,
            "description": new.description,
            "status": QuestionStatus::Open.as_str(),
            "topics": new.topics,
            "populations": new.populations,
        });

        let stored = self
            .gateway
            .insert(tables::QUESTIONS, row, OnConflict::Error)
            .await?;
        self.apply_mutation(mutations::QUESTION_CREATE).await;

        let question: ResearchQuestion = serde_json::from_value(require_row(stored)?)?;
        info!(question_id = %question.id, "Question posted");
        Ok(question)
    }

    /// Move your own question through its lifecycle
    pub async fn set_question_status(&self, id: &str, status: QuestionStatus) -> Result<()> {
        let identity = self.session.require().await?;

        self.gateway
            .update(
                tables::QUESTIONS,
                json!({ "status": status.as_str() }),
                vec![
                    Filter::eq("id", id),
                    Filter::eq("author_id", identity.user_id.as_str()),
                ],
            )
            .await?;
        self.apply_mutation(mutations::QUESTION_SET_STATUS).await;
        Ok(())
    }

    pub async fn delete_question(&self, id: &str) -> Result<()> {
        self.session.require_admin().await?;

        self.gateway
            .delete(tables::QUESTIONS, vec![Filter::eq("id", id)])
            .await?;
        self.apply_mutation(mutations::QUESTION_DELETE).await;
        info!(question_id = id, "Question deleted");
        Ok(())
    }

    /// Register for an event. Returns false when the registration
    /// already existed; a duplicate attempt is not an error.
    pub async fn register_for_event(&self, event_id: &str) -> Result<bool> {
        let identity = self.session.require().await?;

        let stored = self
            .gateway
            .insert(
                tables::REGISTRATIONS,
                json!({ "event_id": event_id, "user_id": identity.user_id }),
                OnConflict::ignore(&["event_id", "user_id"]),
            )
            .await?;
        // Counts may have moved on the backend either way
        self.apply_mutation(mutations::EVENT_REGISTER).await;

        let created = stored.is_some();
        debug!(event_id = event_id, created = created, "Event registration");
        Ok(created)
    }

    /// Drop your registration
    pub async fn cancel_registration(&self, event_id: &str) -> Result<()> {
        let identity = self.session.require().await?;

        self.gateway
            .delete(
                tables::REGISTRATIONS,
                vec![
                    Filter::eq("event_id", event_id),
                    Filter::eq("user_id", identity.user_id.as_str()),
                ],
            )
            .await?;
        self.apply_mutation(mutations::EVENT_CANCEL).await;
        debug!(event_id = event_id, "Registration cancelled");
        Ok(())
    }

    /// Flip a bookmark. Returns the new state: true means saved.
    ///
    /// The existence probe goes straight to the gateway so a toggle
    /// right after a toggle sees the row the first one wrote.
    pub async fn toggle_bookmark(&self, resource_id: &str) -> Result<bool> {
        let identity = self.session.require().await?;

        let existing = self
            .gateway
            .select(
                tables::BOOKMARKS,
                SelectQuery::new()
                    .with_filter(Filter::eq("user_id", identity.user_id.as_str()))
                    .with_filter(Filter::eq("resource_id", resource_id)),
            )
            .await?;

        let saved = if existing.is_empty() {
            self.gateway
                .insert(
                    tables::BOOKMARKS,
                    json!({ "user_id": identity.user_id, "resource_id": resource_id }),
                    OnConflict::ignore(&["user_id", "resource_id"]),
                )
                .await?;
            true
        } else {
            self.gateway
                .delete(
                    tables::BOOKMARKS,
                    vec![
                        Filter::eq("user_id", identity.user_id.as_str()),
                        Filter::eq("resource_id", resource_id),
                    ],
                )
                .await?;
            false
        };

        self.apply_mutation(mutations::BOOKMARK_TOGGLE).await;
        debug!(resource_id = resource_id, saved = saved, "Bookmark toggled");
        Ok(saved)
    }

    /// Admin removal of a member profile.
    ///
    /// Deliberately invalidates no cached reads; the caller refetches
    /// the directory when it is ready, via
    /// [`refresh_profiles`](HubClient::refresh_profiles).
    pub async fn delete_profile(&self, profile_id: &str) -> Result<()> {
        self.session.require_admin().await?;

        self.gateway
            .delete(tables::PROFILES, vec![Filter::eq("id", profile_id)])
            .await?;
        self.apply_mutation(mutations::PROFILE_DELETE).await;
        info!(profile_id = profile_id, "Profile deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::gateway::MemoryGateway;
    use crate::model::StoredFile;
    use std::sync::Arc;

    fn client_over(gateway: MemoryGateway) -> (HubClient, Arc<MemoryGateway>) {
        let gateway = Arc::new(gateway);
        let client = HubClient::with_gateway(gateway.clone(), HubConfig::default());
        (client, gateway)
    }

    async fn member_client(gateway: MemoryGateway) -> (HubClient, Arc<MemoryGateway>) {
        let (client, gateway) =
            client_over(gateway.with_user("u1", "member@example.org", "pw", None));
        client.sign_in("member@example.org", "pw").await.unwrap();
        (client, gateway)
    }

    fn sample_submission() -> NewSubmission {
        NewSubmission {
            title: "Kinship care outcomes".to_string(),
            description: Some("Longitudinal study".to_string()),
            submission_type: "article".to_string(),
            tags: vec!["kinship".to_string()],
            file: None,
        }
    }

    #[tokio::test]
    async fn test_create_submission_forces_pending_and_author() {
        let (client, gateway) = member_client(MemoryGateway::new()).await;

        let submission = client.create_submission(sample_submission()).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.author_id, "u1");
        assert_eq!(gateway.table("research_submissions").len(), 1);
    }

    #[tokio::test]
    async fn test_create_submission_carries_file_fields() {
        let (client, _) = member_client(MemoryGateway::new()).await;

        let mut new = sample_submission();
        new.file = Some(StoredFile {
            url: "memory://research-files/u1/1.pdf".to_string(),
            name: "study.pdf".to_string(),
            size: 2048,
        });
        let submission = client.create_submission(new).await.unwrap();

        assert_eq!(submission.file_name.as_deref(), Some("study.pdf"));
        assert_eq!(submission.file_size, Some(2048));
    }

    #[tokio::test]
    async fn test_anonymous_writes_rejected_before_any_request() {
        let (client, gateway) = client_over(MemoryGateway::new());

        assert!(matches!(
            client.create_submission(sample_submission()).await,
            Err(HubError::AuthRequired)
        ));
        assert!(matches!(
            client.register_for_event("e1").await,
            Err(HubError::AuthRequired)
        ));
        assert!(matches!(
            client.toggle_bookmark("r1").await,
            Err(HubError::AuthRequired)
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_patch_rejected() {
        let (client, gateway) = member_client(MemoryGateway::new()).await;
        let calls_after_sign_in = gateway.call_count();

        let result = client
            .update_submission("s1", SubmissionPatch::default())
            .await;

        assert!(matches!(result, Err(HubError::InvalidInput(_))));
        assert_eq!(gateway.call_count(), calls_after_sign_in);
    }

    #[tokio::test]
    async fn test_update_only_touches_own_rows() {
        let (client, gateway) = member_client(MemoryGateway::new().with_rows(
            "research_submissions",
            vec![serde_json::json!({
                "id": "s1", "author_id": "someone-else", "title": "Theirs",
                "submission_type": "article", "status": "pending"
            })],
        ))
        .await;

        client
            .update_submission("s1", SubmissionPatch::default().with_title("Hijacked"))
            .await
            .unwrap();

        assert_eq!(gateway.table("research_submissions")[0]["title"], "Theirs");
    }

    #[tokio::test]
    async fn test_review_requires_admin() {
        let (client, _) = member_client(MemoryGateway::new()).await;

        assert!(matches!(
            client
                .review_submission("s1", SubmissionStatus::Approved)
                .await,
            Err(HubError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_register_twice_is_idempotent() {
        let (client, gateway) = member_client(MemoryGateway::new()).await;

        assert!(client.register_for_event("e1").await.unwrap());
        assert!(!client.register_for_event("e1").await.unwrap());
        assert_eq!(gateway.table("event_registrations").len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_registration_removes_row() {
        let (client, gateway) = member_client(MemoryGateway::new()).await;

        client.register_for_event("e1").await.unwrap();
        client.cancel_registration("e1").await.unwrap();

        assert!(gateway.table("event_registrations").is_empty());
    }

    #[tokio::test]
    async fn test_bookmark_toggle_round_trip() {
        let (client, gateway) = member_client(MemoryGateway::new()).await;

        assert!(client.toggle_bookmark("r1").await.unwrap());
        assert_eq!(gateway.table("resource_bookmarks").len(), 1);

        assert!(!client.toggle_bookmark("r1").await.unwrap());
        assert!(gateway.table("resource_bookmarks").is_empty());
    }

    #[tokio::test]
    async fn test_question_lifecycle() {
        let (client, _) = member_client(MemoryGateway::new()).await;

        let question = client
            .create_question(NewQuestion {
                title: "What supports help aging-out youth?".to_string(),
                description: None,
                topics: vec!["transition".to_string()],
                populations: vec!["youth 16-21".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(question.status, QuestionStatus::Open);

        client
            .set_question_status(&question.id, QuestionStatus::InProgress)
            .await
            .unwrap();

        let mine = client.my_questions().await.unwrap();
        assert_eq!(mine[0].status, QuestionStatus::InProgress);
    }
}
