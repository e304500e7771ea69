//! HTTP gateway
//!
//! Talks to a hosted Postgres gateway: `/rest/v1` for rows,
//! `/storage/v1` for objects, `/auth/v1` for password sign-in. Requests
//! carry the project api key plus either the signed-in bearer token or
//! the api key again for anonymous reads.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthSession, Direction, Filter, Gateway, OnConflict, SelectQuery};
use crate::config::HubConfig;
use crate::error::{HubError, Result};

pub struct HttpGateway {
    base_url: String,
    api_key: String,
    client: Client,
    bearer: RwLock<Option<String>>,
}

impl HttpGateway {
    pub fn new(config: &HubConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            bearer: RwLock::new(None),
        }
    }

    async fn auth_header(&self) -> String {
        match self.bearer.read().await.as_ref() {
            Some(token) => format!("Bearer {}", token),
            None => format!("Bearer {}", self.api_key),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>> {
        let url = format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            table,
            select_params(&query).join("&")
        );
        debug!(url = %url, "Gateway select");

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, self.auth_header().await)
            .send()
            .await?;

        handle_response(response).await
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        on_conflict: OnConflict,
    ) -> Result<Option<Value>> {
        let (url, prefer) = insert_target(&self.base_url, table, &on_conflict);
        debug!(table = table, "Gateway insert");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, self.auth_header().await)
            .header("Prefer", prefer)
            .json(&row)
            .send()
            .await?;

        let rows: Vec<Value> = handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, table: &str, patch: Value, filters: Vec<Filter>) -> Result<()> {
        if filters.is_empty() {
            return Err(HubError::InvalidInput(format!(
                "refusing an unfiltered update on {}",
                table
            )));
        }

        let url = format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            table,
            filter_params(&filters).join("&")
        );
        debug!(url = %url, "Gateway update");

        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, self.auth_header().await)
            .json(&patch)
            .send()
            .await?;

        check_status(response).await
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<()> {
        if filters.is_empty() {
            return Err(HubError::InvalidInput(format!(
                "refusing an unfiltered delete on {}",
                table
            )));
        }

        let url = format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            table,
            filter_params(&filters).join("&")
        );
        debug!(url = %url, "Gateway delete");

        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, self.auth_header().await)
            .send()
            .await?;

        check_status(response).await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        debug!(url = %url, size = bytes.len(), "Gateway upload");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, self.auth_header().await)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        check_status(response).await
    }

    fn object_public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        debug!(email = email, "Gateway sign-in");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await?;

        let token: TokenResponse = handle_response(response).await?;
        Ok(token.into_session())
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await?;

        // Already-revoked tokens sign out cleanly
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        check_status(response).await
    }

    async fn set_auth(&self, access_token: Option<String>) {
        *self.bearer.write().await = access_token;
    }
}

fn select_params(query: &SelectQuery) -> Vec<String> {
    let mut params = vec!["select=*".to_string()];
    params.extend(filter_params(&query.filters));

    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|order| {
                let direction = match order.direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                format!("{}.{}", order.column, direction)
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(format!("order={}", order));
    }

    if let Some(limit) = query.limit {
        params.push(format!("limit={}", limit));
    }

    params
}

fn filter_params(filters: &[Filter]) -> Vec<String> {
    filters
        .iter()
        .map(|filter| {
            format!(
                "{}={}.{}",
                filter.column,
                filter.op.as_str(),
                urlencoding::encode(&render_value(&filter.value))
            )
        })
        .collect()
}

/// Strings render bare; everything else uses its JSON form
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn insert_target(base_url: &str, table: &str, on_conflict: &OnConflict) -> (String, String) {
    let mut url = format!("{}/rest/v1/{}", base_url, table);
    let mut prefer = "return=representation".to_string();

    if let OnConflict::Ignore { columns } = on_conflict {
        url.push_str(&format!("?on_conflict={}", columns.join(",")));
        prefer.push_str(",resolution=ignore-duplicates");
    }

    (url, prefer)
}

async fn handle_response<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(HubError::NotFound("resource not found".to_string()));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(HubError::Gateway {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

async fn check_status(response: Response) -> Result<()> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(HubError::NotFound("resource not found".to_string()));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(HubError::Gateway {
            status: status.as_u16(),
            message,
        });
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    app_metadata: Value,
    #[serde(default)]
    user_metadata: Value,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let role = claim_role(&self.user.app_metadata)
            .or_else(|| claim_role(&self.user.user_metadata));

        AuthSession {
            user_id: self.user.id,
            email: self.user.email,
            role,
            access_token: self.access_token,
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

fn claim_role(metadata: &Value) -> Option<String> {
    metadata
        .get("role")
        .and_then(Value::as_str)
        .map(str::to_string)
}
