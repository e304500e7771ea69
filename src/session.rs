//! Session state
//!
//! Holds the signed-in identity shared by every client clone. Reads and
//! writes go through a `tokio::sync::RwLock`, so accessors are async.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{HubError, Result};

/// Access level attached to a signed-in identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    /// Parse a role claim. Anything unrecognized degrades to member.
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is signed in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// A signed-in session with its credential
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Shared session slot. Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, session: Session) {
        debug!(user_id = %session.identity.user_id, role = %session.identity.role, "Session established");
        *self.inner.write().await = Some(session);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
        debug!("Session cleared");
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn viewer_id(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|session| session.identity.user_id.clone())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    pub async fn is_signed_in(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// The signed-in identity, or `AuthRequired`
    pub async fn require(&self) -> Result<Identity> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|session| session.identity.clone())
            .ok_or(HubError::AuthRequired)
    }

    /// The signed-in identity if it is an admin, or `Forbidden`
    pub async fn require_admin(&self) -> Result<Identity> {
        let identity = self.require().await?;
        if identity.role != Role::Admin {
            return Err(HubError::Forbidden(format!(
                "admin role required, have {}",
                identity.role
            )));
        }
        Ok(identity)
    }
}
