//! Persisted conversation history record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::turn::Turn;

/// The stored form of a user's conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredHistory {
    /// User identifier the history belongs to
    pub owner: String,
    /// Turns in conversation order
    pub turns: Vec<Turn>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl StoredHistory {
    /// Create a record stamped with the current time
    pub fn new(owner: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            owner: owner.into(),
            turns,
            updated_at: Utc::now(),
        }
    }
}
