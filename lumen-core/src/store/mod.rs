//! Document store abstraction
//!
//! The hosted data backend is a per-user document store reached through
//! point queries. "Not found" is a first-class outcome (`StoreError::NotFound`)
//! that callers check explicitly before treating a result as fatal.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(table: &str, id: &str) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for per-user document stores
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the single record in `table` keyed by `id`
    async fn select_by_id(&self, table: &str, id: &str) -> StoreResult<Value>;

    /// Fetch up to `limit` rows owned by `owner`, newest first by `order_by`.
    ///
    /// An owner with no rows yields an empty list, not `NotFound`.
    async fn select_recent(
        &self,
        table: &str,
        owner: &str,
        order_by: &str,
        limit: usize,
    ) -> StoreResult<Vec<Value>>;

    /// Insert or fully replace the record keyed by `id`
    async fn upsert(&self, table: &str, id: &str, record: Value) -> StoreResult<()>;

    /// Delete the record keyed by `id`; deleting a missing record succeeds
    async fn delete_by_id(&self, table: &str, id: &str) -> StoreResult<()>;
}

/// Turns the `NotFound` sentinel into `Ok(None)`
pub trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Deserialize a stored document into a typed record
pub fn decode<T: DeserializeOwned>(value: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(value)?)
}

/// Sort rows newest first by `order_by` and keep at most `limit`
pub(crate) fn newest_first(mut rows: Vec<Value>, order_by: &str, limit: usize) -> Vec<Value> {
    rows.sort_by(|a, b| compare_field(b.get(order_by), a.get(order_by)));
    rows.truncate(limit);
    rows
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_maps_not_found() {
        let missing: StoreResult<Value> = Err(StoreError::not_found("profiles", "u1"));
        assert!(missing.optional().unwrap().is_none());

        let failed: StoreResult<Value> = Err(StoreError::Backend("boom".to_string()));
        assert!(failed.optional().is_err());
    }

    #[test]
    fn test_newest_first() {
        let rows = vec![
            json!({"title": "a", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"title": "c", "created_at": "2024-03-01T00:00:00Z"}),
            json!({"title": "b", "created_at": "2024-02-01T00:00:00Z"}),
        ];
        let sorted = newest_first(rows, "created_at", 2);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0]["title"], "c");
        assert_eq!(sorted[1]["title"], "b");
    }

    #[test]
    fn test_newest_first_compares_instants() {
        let rows = vec![
            json!({"title": "whole", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"title": "fraction", "created_at": "2024-01-01T00:00:00.5Z"}),
        ];
        let sorted = newest_first(rows, "created_at", 2);
        assert_eq!(sorted[0]["title"], "fraction");

        // 23:00 UTC the previous day
        let rows = vec![
            json!({"title": "utc", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"title": "offset", "created_at": "2024-01-01T01:00:00+02:00"}),
        ];
        let sorted = newest_first(rows, "created_at", 2);
        assert_eq!(sorted[0]["title"], "utc");
        assert_eq!(sorted[1]["title"], "offset");
    }

    #[test]
    fn test_newest_first_falls_back_to_text() {
        let rows = vec![json!({"rank": "a"}), json!({"rank": "b"})];
        let sorted = newest_first(rows, "rank", 2);
        assert_eq!(sorted[0]["rank"], "b");
    }
}
