//! Conversation history persistence

use lumen_core::records::tables;
use lumen_core::session::{has_user_turn, StoredHistory, Turn};
use lumen_core::store::{decode, DocumentStore, OptionalExt, StoreError};
use std::sync::Arc;
use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// Loads, saves and clears a user's stored turn sequence
pub struct HistoryStore {
    store: Arc<dyn DocumentStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load the stored turns, or `None` when nothing has been stored.
    ///
    /// The returned turns are freshly deserialized and share nothing with
    /// the backend's copy.
    pub async fn load(&self, user_id: &str) -> SessionResult<Option<Vec<Turn>>> {
        let Some(value) = self
            .store
            .select_by_id(tables::CHAT_HISTORIES, user_id)
            .await
            .optional()?
        else {
            debug!("No stored history for user {}", user_id);
            return Ok(None);
        };

        let history: StoredHistory = decode(value)?;
        debug!(
            "Loaded {} stored turns for user {}",
            history.turns.len(),
            user_id
        );
        Ok(Some(history.turns).filter(|turns| !turns.is_empty()))
    }

    /// Replace the stored turns.
    ///
    /// Sequences without a user turn are rejected and nothing is written.
    pub async fn save(&self, user_id: &str, turns: &[Turn]) -> SessionResult<()> {
        if !has_user_turn(turns) {
            return Err(SessionError::NoUserTurn);
        }

        let record = StoredHistory::new(user_id, turns.to_vec());
        let value = serde_json::to_value(&record).map_err(StoreError::from)?;
        self.store
            .upsert(tables::CHAT_HISTORIES, user_id, value)
            .await?;
        debug!("Saved {} turns for user {}", turns.len(), user_id);
        Ok(())
    }

    /// Delete the stored turns
    pub async fn clear(&self, user_id: &str) -> SessionResult<()> {
        self.store
            .delete_by_id(tables::CHAT_HISTORIES, user_id)
            .await?;
        debug!("Cleared stored history for user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::session::{Part, Role};
    use lumen_core::store::MemoryStore;
    use serde_json::json;

    fn history_store() -> (Arc<MemoryStore>, HistoryStore) {
        let backend = Arc::new(MemoryStore::new());
        (backend.clone(), HistoryStore::new(backend))
    }

    #[tokio::test]
    async fn test_load_absent() {
        let (_, store) = history_store();
        assert!(store.load("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_text_and_image() {
        let (_, store) = history_store();
        let turns = vec![
            Turn::assistant_text("Hi!"),
            Turn::new(
                Role::User,
                vec![
                    Part::text("what is in this photo?"),
                    Part::image("image/webp", "UklGRiQAAABXRUJQVlA4IBgAAAAwAQCdASoBAAEAAwA0JaQAA3AA/vuUAAA="),
                ],
            )
            .unwrap(),
        ];

        store.save("u1", &turns).await.unwrap();
        let loaded = store.load("u1").await.unwrap().unwrap();

        assert_eq!(loaded, turns);
    }

    #[tokio::test]
    async fn test_save_rejects_assistant_only() {
        let (backend, store) = history_store();
        let err = store
            .save("u1", &[Turn::assistant_text("Hi!")])
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::NoUserTurn));
        assert!(!backend.contains(tables::CHAT_HISTORIES, "u1"));
    }

    #[tokio::test]
    async fn test_loaded_snapshot_is_independent() {
        let (_, store) = history_store();
        store
            .save("u1", &[Turn::user_text("hello")])
            .await
            .unwrap();

        let mut first = store.load("u1").await.unwrap().unwrap();
        first.push(Turn::assistant_text("mutated"));

        let second = store.load("u1").await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_then_load_is_absent() {
        let (_, store) = history_store();
        store
            .save("u1", &[Turn::user_text("hello")])
            .await
            .unwrap();
        store.clear("u1").await.unwrap();
        assert!(store.load("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_stored_record_is_absent() {
        let (backend, store) = history_store();
        backend
            .upsert(
                tables::CHAT_HISTORIES,
                "u1",
                json!({"owner": "u1", "turns": [], "updated_at": "2024-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        assert!(store.load("u1").await.unwrap().is_none());
    }
}
