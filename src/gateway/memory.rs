//! In-memory gateway
//!
//! Backs tests and offline development with the same contract as the
//! HTTP gateway: JSON rows in per-table vectors, objects in a byte map,
//! and a seeded user list for password sign-in. Ids and `created_at`
//! stamps are minted on insert the way the hosted gateway does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use tracing::debug;
use uuid::Uuid;

use super::{AuthSession, Direction, Filter, FilterOp, Gateway, OnConflict, Order, SelectQuery};
use crate::error::{HubError, Result};

#[derive(Debug, Clone)]
struct MemoryUser {
    user_id: String,
    email: String,
    password: String,
    role: Option<String>,
}

/// Gateway over process-local state
pub struct MemoryGateway {
    tables: DashMap<String, Vec<Value>>,
    objects: DashMap<String, Vec<u8>>,
    /// Seeded credentials, keyed by email
    users: DashMap<String, MemoryUser>,
    call_count: AtomicU32,
    available: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            objects: DashMap::new(),
            users: DashMap::new(),
            call_count: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Seed a sign-in-able user
    pub fn with_user(self, user_id: &str, email: &str, password: &str, role: Option<&str>) -> Self {
        self.users.insert(
            email.to_string(),
            MemoryUser {
                user_id: user_id.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: role.map(str::to_string),
            },
        );
        self
    }

    /// Seed table rows
    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.tables.entry(table.to_string()).or_default().extend(rows);
        self
    }

    /// Simulate the backend going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// How many gateway calls have been made
    pub fn call_count(&self) -> u32 {
        self.call_count.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot a table's rows for assertions
    pub fn table(&self, table: &str) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    /// Stored object bytes, if any
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .get(&format!("{}/{}", bucket, path))
            .map(|bytes| bytes.clone())
    }

    fn record_call(&self) {
        self.call_count.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if !self.available.load(AtomicOrdering::SeqCst) {
            return Err(HubError::Gateway {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>> {
        self.record_call();
        self.ensure_available()?;

        let mut rows: Vec<Value> = self
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|filter| matches(row, filter)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.order.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(
        &self,
        table: &str,
        mut row: Value,
        on_conflict: OnConflict,
    ) -> Result<Option<Value>> {
        self.record_call();
        self.ensure_available()?;

        let fields = row.as_object_mut().ok_or_else(|| {
            HubError::InvalidInput("insert body must be a JSON object".to_string())
        })?;
        if !fields.contains_key("id") {
            fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !fields.contains_key("created_at") {
            fields.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let mut rows = self.tables.entry(table.to_string()).or_default();

        match &on_conflict {
            OnConflict::Ignore { columns } => {
                let duplicate = rows.iter().any(|existing| {
                    columns.iter().all(|column| {
                        existing.get(column.as_str()) == row.get(column.as_str())
                    })
                });
                if duplicate {
                    debug!(table = table, "Insert skipped, row exists");
                    return Ok(None);
                }
            }
            OnConflict::Error => {
                if let Some(id) = row.get("id") {
                    if rows.iter().any(|existing| existing.get("id") == Some(id)) {
                        return Err(HubError::Gateway {
                            status: 409,
                            message: format!("duplicate key on {}", table),
                        });
                    }
                }
            }
        }

        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn update(&self, table: &str, patch: Value, filters: Vec<Filter>) -> Result<()> {
        self.record_call();
        self.ensure_available()?;

        if filters.is_empty() {
            return Err(HubError::InvalidInput(format!(
                "refusing an unfiltered update on {}",
                table
            )));
        }
        let patch_fields = patch.as_object().ok_or_else(|| {
            HubError::InvalidInput("update body must be a JSON object".to_string())
        })?;

        if let Some(mut rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !filters.iter().all(|filter| matches(row, filter)) {
                    continue;
                }
                if let Some(fields) = row.as_object_mut() {
                    for (key, value) in patch_fields {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        Ok(())
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<()> {
        self.record_call();
        self.ensure_available()?;

        if filters.is_empty() {
            return Err(HubError::InvalidInput(format!(
                "refusing an unfiltered delete on {}",
                table
            )));
        }

        if let Some(mut rows) = self.tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|filter| matches(row, filter)));
        }

        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        self.record_call();
        self.ensure_available()?;

        self.objects.insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    fn object_public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{}/{}", bucket, path)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.record_call();
        self.ensure_available()?;

        let user = self
            .users
            .get(email)
            .filter(|user| user.password == password)
            .ok_or_else(|| HubError::Gateway {
                status: 400,
                message: "invalid login credentials".to_string(),
            })?;

        Ok(AuthSession {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            access_token: format!("memory-token-{}", Uuid::new_v4()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        self.record_call();
        self.ensure_available()?;
        Ok(())
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = match row.get(filter.column.as_str()) {
        Some(value) => value,
        None => return false,
    };

    match filter.op {
        FilterOp::Eq => field == &filter.value,
        FilterOp::Gte => compare(field, &filter.value) != Ordering::Less,
        FilterOp::Lte => compare(field, &filter.value) != Ordering::Greater,
    }
}

/// Timestamp strings compare as instants so mixed subsecond precision
/// orders correctly; everything else compares by JSON shape.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn compare_rows(a: &Value, b: &Value, order: &[Order]) -> Ordering {
    for key in order {
        let left = a.get(key.column.as_str()).unwrap_or(&Value::Null);
        let right = b.get(key.column.as_str()).unwrap_or(&Value::Null);

        let mut ordering = compare(left, right);
        if key.direction == Direction::Desc {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
