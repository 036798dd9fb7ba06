//! Profile records read by the context aggregator
//!
//! Each record lives in its own table, keyed by the owning user's id.
//! Fields are optional because the hosted backend fills them in
//! independently as the user completes each part of their profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Table names used by the document store
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const RESUMES: &str = "resumes";
    pub const PREFERENCES: &str = "preferences";
    pub const HEALTH_PROFILES: &str = "health_profiles";
    pub const TASKS: &str = "tasks";
    pub const CHAT_HISTORIES: &str = "chat_histories";
}

/// Identity record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Free-text professional summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    #[serde(default)]
    pub summary: Option<String>,
}

/// List-valued preference record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dislikes: Vec<String>,
}

/// Goals and dietary exclusions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub goals: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exclusions: Vec<String>,
}

/// One task row; many per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Unset array columns come back as `null` rather than being omitted
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Option<String>>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_columns_decode_as_empty() {
        let prefs: PreferenceRecord =
            serde_json::from_value(json!({"interests": ["poetry"], "dislikes": null})).unwrap();
        assert_eq!(prefs.interests, vec!["poetry".to_string()]);
        assert!(prefs.dislikes.is_empty());

        let health: HealthRecord = serde_json::from_value(
            json!({"user_id": "u1", "goals": null, "exclusions": ["nuts", null]}),
        )
        .unwrap();
        assert!(health.goals.is_empty());
        assert_eq!(health.exclusions, vec!["nuts".to_string()]);
    }

    #[test]
    fn test_missing_columns_decode_as_empty() {
        let prefs: PreferenceRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(prefs, PreferenceRecord::default());
    }

    #[test]
    fn test_untitled_task() {
        let task: TaskRecord = serde_json::from_value(
            json!({"title": null, "created_at": "2024-05-01T09:00:00Z"}),
        )
        .unwrap();
        assert!(task.title.is_none());
    }
}
