//! In-memory document store

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use super::{newest_first, DocumentStore, StoreError, StoreResult};

/// Keeps documents in process memory.
///
/// Every read hands out a clone, so callers never share structure with
/// the stored copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), Value>>,
    rows: RwLock<HashMap<(String, String), Vec<Value>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to a many-rows-per-owner table such as `tasks`
    pub fn insert_row(&self, table: &str, owner: &str, row: Value) {
        self.rows
            .write()
            .entry(key(table, owner))
            .or_default()
            .push(row);
    }

    /// Whether a keyed record exists
    pub fn contains(&self, table: &str, id: &str) -> bool {
        self.records.read().contains_key(&key(table, id))
    }
}

fn key(table: &str, id: &str) -> (String, String) {
    (table.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn select_by_id(&self, table: &str, id: &str) -> StoreResult<Value> {
        self.records
            .read()
            .get(&key(table, id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn select_recent(
        &self,
        table: &str,
        owner: &str,
        order_by: &str,
        limit: usize,
    ) -> StoreResult<Vec<Value>> {
        let rows = self
            .rows
            .read()
            .get(&key(table, owner))
            .cloned()
            .unwrap_or_default();
        Ok(newest_first(rows, order_by, limit))
    }

    async fn upsert(&self, table: &str, id: &str, record: Value) -> StoreResult<()> {
        self.records.write().insert(key(table, id), record);
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> StoreResult<()> {
        self.records.write().remove(&key(table, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_select_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.select_by_id("profiles", "u1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let store = MemoryStore::new();
        store
            .upsert("profiles", "u1", json!({"full_name": "Ada"}))
            .await
            .unwrap();
        store
            .upsert("profiles", "u1", json!({"full_name": "Grace"}))
            .await
            .unwrap();

        let value = store.select_by_id("profiles", "u1").await.unwrap();
        assert_eq!(value["full_name"], "Grace");

        store.delete_by_id("profiles", "u1").await.unwrap();
        assert!(!store.contains("profiles", "u1"));
        store.delete_by_id("profiles", "u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_are_independent_copies() {
        let store = MemoryStore::new();
        store
            .upsert("chat_histories", "u1", json!({"turns": [1, 2]}))
            .await
            .unwrap();

        let mut first = store.select_by_id("chat_histories", "u1").await.unwrap();
        first["turns"] = json!([]);

        let second = store.select_by_id("chat_histories", "u1").await.unwrap();
        assert_eq!(second["turns"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_select_recent_orders_and_limits() {
        let store = MemoryStore::new();
        for day in 1..=7 {
            store.insert_row(
                "tasks",
                "u1",
                json!({"title": format!("task {}", day), "created_at": format!("2024-05-0{}T00:00:00Z", day)}),
            );
        }

        let rows = store
            .select_recent("tasks", "u1", "created_at", 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["title"], "task 7");
        assert_eq!(rows[4]["title"], "task 3");

        let empty = store
            .select_recent("tasks", "nobody", "created_at", 5)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }
}
