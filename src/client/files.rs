//! File uploads
//!
//! Uploads land under `{user_id}/{timestamp}.{ext}` so member files
//! never collide and the original file name stays out of the key. The
//! name survives in the returned `StoredFile` for display.

use chrono::Utc;
use tracing::debug;

use super::HubClient;
use crate::error::{HubError, Result};
use crate::model::StoredFile;

/// Bucket for research attachments
pub const RESEARCH_BUCKET: &str = "research-files";
/// Bucket for profile avatars
pub const AVATAR_BUCKET: &str = "avatars";

impl HubClient {
    /// Upload a research attachment for the signed-in member
    pub async fn upload_submission_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile> {
        self.upload_to(RESEARCH_BUCKET, file_name, bytes, content_type)
            .await
    }

    /// Upload an avatar image for the signed-in member
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile> {
        self.upload_to(AVATAR_BUCKET, file_name, bytes, content_type)
            .await
    }

    async fn upload_to(
        &self,
        bucket: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile> {
        let identity = self.session.require().await?;
        let path = object_path(&identity.user_id, file_name, Utc::now().timestamp_millis())?;
        let size = bytes.len() as i64;

        self.gateway
            .upload_object(bucket, &path, bytes, content_type)
            .await?;
        let url = self.gateway.object_public_url(bucket, &path);

        debug!(bucket = bucket, path = %path, size = size, "File uploaded");
        Ok(StoredFile {
            url,
            name: file_name.to_string(),
            size,
        })
    }
}

fn object_path(user_id: &str, file_name: &str, timestamp_millis: i64) -> Result<String> {
    let ext = file_name
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && *ext != file_name)
        .ok_or_else(|| {
            HubError::InvalidInput(format!("file name has no extension: {}", file_name))
        })?;

    Ok(format!(
        "{}/{}.{}",
        user_id,
        timestamp_millis,
        ext.to_ascii_lowercase()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::gateway::MemoryGateway;
    use std::sync::Arc;

    #[test]
    fn test_object_path_layout() {
        assert_eq!(
            object_path("u1", "Report.PDF", 1_700_000_000_000).unwrap(),
            "u1/1700000000000.pdf"
        );
    }

    #[test]
    fn test_object_path_rejects_missing_extension() {
        assert!(matches!(
            object_path("u1", "README", 1),
            Err(HubError::InvalidInput(_))
        ));
        assert!(matches!(
            object_path("u1", "archive.", 1),
            Err(HubError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_stores_and_describes_file() {
        let gateway = Arc::new(
            MemoryGateway::new().with_user("u1", "member@example.org", "pw", None),
        );
        let client = HubClient::with_gateway(gateway.clone(), HubConfig::default());
        client.sign_in("member@example.org", "pw").await.unwrap();

        let stored = client
            .upload_submission_file("study.pdf", vec![0u8; 64], "application/pdf")
            .await
            .unwrap();

        assert_eq!(stored.name, "study.pdf");
        assert_eq!(stored.size, 64);
        assert!(stored.url.starts_with("memory://research-files/u1/"));
        assert!(stored.url.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_anonymous_upload_rejected() {
        let client = HubClient::with_gateway(
            Arc::new(MemoryGateway::new()),
            HubConfig::default(),
        );

        assert!(matches!(
            client.upload_avatar("me.png", vec![1], "image/png").await,
            Err(HubError::AuthRequired)
        ));
    }
}
