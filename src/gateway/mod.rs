//! Backend gateway
//!
//! The narrow surface the client talks through: row queries with
//! equality and range filters, writes, object storage, and password
//! auth. `HttpGateway` speaks to a hosted Postgres gateway;
//! `MemoryGateway` backs tests and offline work with the same contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Comparison applied by a row filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
        }
    }
}

/// One column comparison
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// A row query: filters ANDed together, ordered, optionally truncated
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What an insert does when it collides with an existing row
#[derive(Debug, Clone)]
pub enum OnConflict {
    /// Surface the conflict as a gateway error
    Error,
    /// Skip the insert when the named columns already match a row
    Ignore { columns: Vec<String> },
}

impl OnConflict {
    pub fn ignore(columns: &[&str]) -> Self {
        OnConflict::Ignore {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// What the auth provider hands back on a successful sign-in
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    /// Role claim, when the provider attaches one
    pub role: Option<String>,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything the client needs from a backend.
///
/// Rows travel as raw JSON; the model layer owns typed decoding.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Query rows from a table
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>>;

    /// Insert one row. `None` means an `OnConflict::Ignore` insert
    /// found an existing row and stored nothing.
    async fn insert(&self, table: &str, row: Value, on_conflict: OnConflict)
        -> Result<Option<Value>>;

    /// Patch every row matching the filters. Refuses an empty filter
    /// list.
    async fn update(&self, table: &str, patch: Value, filters: Vec<Filter>) -> Result<()>;

    /// Delete every row matching the filters. Refuses an empty filter
    /// list.
    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<()>;

    /// Store bytes in an object bucket
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    /// Public URL for a stored object
    fn object_public_url(&self, bucket: &str, path: &str) -> String;

    /// Exchange email and password for a session
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Revoke the current session's token
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    /// Attach or drop the bearer token used for subsequent calls.
    /// Backends without per-request auth ignore this.
    async fn set_auth(&self, _access_token: Option<String>) {}
}

/// Decode a batch of raw rows into a typed list
pub fn typed_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_filter_constructors() {
        let filter = Filter::eq("status", "approved");
        assert_eq!(filter.column, "status");
        assert_eq!(filter.op, FilterOp::Eq);
        assert_eq!(filter.value, json!("approved"));

        let filter = Filter::gte("start_date", "2026-01-01T00:00:00Z");
        assert_eq!(filter.op, FilterOp::Gte);
    }

    #[test]
    fn test_query_builder() {
        let query = SelectQuery::new()
            .with_filter(Filter::eq("featured", true))
            .with_order(Order::desc("created_at"))
            .with_limit(10);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.order.len(), 1);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_typed_rows() {
        #[derive(Deserialize)]
        struct Row {
            id: String,
        }

        let rows = typed_rows::<Row>(vec![json!({"id": "a"}), json!({"id": "b"})]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a");

        assert!(typed_rows::<Row>(vec![json!({"nope": 1})]).is_err());
    }
}
