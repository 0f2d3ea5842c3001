//! Remote data service interfaces.
//!
//! The sync layer only talks to the row store and the blob store through the
//! [`RemoteStore`] and [`BlobStore`] traits. [`SqliteStore`] and [`LocalBlobStore`]
//! are the implementations this service ships with.

mod blob;
mod feed;
mod schema;
mod sqlite;

pub use blob::*;
pub use feed::*;
pub use schema::{table_spec, TableSpec};
pub use sqlite::*;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::AppError;

/// A row as the store sees it: a flat JSON object keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Sort order for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Equality filters, ordering and limit for a row query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<i64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only rows whose `column` equals `value`.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Whether a row satisfies every equality filter. A missing column counts as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }
}

/// Kind of change delivered by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One notification from a table's change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// Row after the change; absent for deletes.
    pub new: Option<Row>,
    /// Row before the change; absent for inserts.
    pub old: Option<Row>,
}

impl ChangeEvent {
    pub fn insert(table: &str, row: Row) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
        }
    }

    pub fn update(table: &str, old: Row, new: Row) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
        }
    }

    pub fn delete(table: &str, old: Row) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Identifier of the affected row.
    pub fn row_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .and_then(|row| row.get("id"))
            .and_then(Value::as_str)
    }
}

/// Row-oriented store with a per-table change feed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Ordered rows matching the query.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError>;

    /// Insert a row; the store assigns `id`, `created_at` and `updated_at`.
    async fn insert(&self, table: &str, fields: Row) -> Result<Row, AppError>;

    /// Apply a partial update to one row and return the stored result.
    async fn update(&self, table: &str, id: &str, fields: Row) -> Result<Row, AppError>;

    /// Apply a partial update to every row matching the query's filters.
    async fn update_where(
        &self,
        table: &str,
        query: &Query,
        fields: Row,
    ) -> Result<Vec<Row>, AppError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError>;

    async fn count(&self, table: &str, query: &Query) -> Result<i64, AppError>;

    /// Receiver for the table's change feed. Dropping it ends the subscription.
    fn changes(&self, table: &str) -> broadcast::Receiver<ChangeEvent>;
}

/// Options for a blob write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub cache_control: String,
    /// Overwrite an existing object under the same key.
    pub upsert: bool,
}

/// Binary object storage addressed by bucket and key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<(), AppError>;

    /// Public URL under which the object is served.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError>;
}

/// Schema-checked decode of a store row into an entity.
pub fn decode_row<T: DeserializeOwned>(table: &str, row: Row) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| AppError::Decode(format!("Malformed {} row: {}", table, e)))
}

/// Encode a request payload as store fields.
pub fn encode_fields<S: Serialize>(payload: &S) -> Result<Row, AppError> {
    match serde_json::to_value(payload)? {
        Value::Object(fields) => Ok(fields),
        other => Err(AppError::BadRequest(format!(
            "Expected an object payload, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_matches_equality_filters() {
        let query = Query::new().eq("status", "published").eq("is_featured", true);

        assert!(query.matches(&row(json!({ "status": "published", "is_featured": true }))));
        assert!(!query.matches(&row(json!({ "status": "draft", "is_featured": true }))));
        assert!(!query.matches(&row(json!({ "status": "published" }))));
        assert!(Query::new().matches(&row(json!({}))));
    }

    #[test]
    fn test_query_null_filter_matches_missing_column() {
        let query = Query::new().eq("semester", Value::Null);
        assert!(query.matches(&row(json!({ "title": "Notes" }))));
        assert!(!query.matches(&row(json!({ "semester": "3" }))));
    }

    #[test]
    fn test_change_event_row_id() {
        let insert = ChangeEvent::insert("news", row(json!({ "id": "n1" })));
        let delete = ChangeEvent::delete("news", row(json!({ "id": "n2" })));
        assert_eq!(insert.row_id(), Some("n1"));
        assert_eq!(delete.row_id(), Some("n2"));
    }

    #[test]
    fn test_decode_row_reports_table() {
        let err = decode_row::<crate::models::Program>("programs", row(json!({ "id": 7 })))
            .unwrap_err();
        assert!(matches!(err, AppError::Decode(ref msg) if msg.starts_with("Malformed programs row")));
    }
}
