//! User context aggregation and system instruction assembly

use futures::try_join;
use lumen_core::records::{
    tables, HealthRecord, PreferenceRecord, ProfileRecord, ResumeRecord, TaskRecord,
};
use lumen_core::store::{decode, DocumentStore, OptionalExt, StoreResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ContextFetchError, ContextSource};

const TASK_ORDER_COLUMN: &str = "created_at";

/// Profile fragments gathered for one user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSnapshot {
    pub profile: Option<ProfileRecord>,
    pub resume: Option<ResumeRecord>,
    pub preferences: Option<PreferenceRecord>,
    pub health: Option<HealthRecord>,
    pub tasks: Vec<TaskRecord>,
}

impl ProfileSnapshot {
    /// Render present fragments as one paragraph.
    ///
    /// Order is fixed: identity, professional, preferences, health, tasks.
    pub fn render(&self) -> String {
        let mut sentences: Vec<String> = Vec::new();

        if let Some(name) = self
            .profile
            .as_ref()
            .and_then(|p| non_blank(p.full_name.as_deref()))
        {
            sentences.push(format!("The user's name is {}.", name));
        }

        if let Some(summary) = self
            .resume
            .as_ref()
            .and_then(|r| non_blank(r.summary.as_deref()))
        {
            sentences.push(format!("Professional summary: {}", terminate(summary)));
        }

        if let Some(prefs) = &self.preferences {
            push_list(&mut sentences, "Interests", &prefs.interests, ", ");
            push_list(&mut sentences, "Dislikes", &prefs.dislikes, ", ");
        }

        if let Some(health) = &self.health {
            push_list(&mut sentences, "Health goals", &health.goals, ", ");
            push_list(&mut sentences, "Dietary exclusions", &health.exclusions, ", ");
        }

        let titles: Vec<String> = self
            .tasks
            .iter()
            .filter_map(|t| t.title.clone())
            .collect();
        push_list(&mut sentences, "Recent tasks", &titles, "; ");

        sentences.join(" ").trim().to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn terminate(sentence: &str) -> String {
    if sentence.ends_with(['.', '!', '?']) {
        sentence.to_string()
    } else {
        format!("{}.", sentence)
    }
}

fn push_list(sentences: &mut Vec<String>, label: &str, items: &[String], separator: &str) {
    let items: Vec<&str> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();
    if !items.is_empty() {
        sentences.push(format!("{}: {}.", label, items.join(separator)));
    }
}

/// Collects a user's profile records into a context paragraph
pub struct ContextAggregator {
    store: Arc<dyn DocumentStore>,
    task_limit: usize,
}

impl ContextAggregator {
    /// Create a new aggregator
    pub fn new(store: Arc<dyn DocumentStore>, task_limit: usize) -> Self {
        Self { store, task_limit }
    }

    /// Look up all five sources concurrently.
    ///
    /// Missing records are skipped; the first other failure aborts the
    /// whole lookup and names its source.
    pub async fn snapshot(&self, user_id: &str) -> Result<ProfileSnapshot, ContextFetchError> {
        let (profile, resume, preferences, health, tasks) = try_join!(
            self.fetch::<ProfileRecord>(tables::PROFILES, user_id, ContextSource::Identity),
            self.fetch::<ResumeRecord>(tables::RESUMES, user_id, ContextSource::Professional),
            self.fetch::<PreferenceRecord>(
                tables::PREFERENCES,
                user_id,
                ContextSource::Preferences
            ),
            self.fetch::<HealthRecord>(tables::HEALTH_PROFILES, user_id, ContextSource::Health),
            self.fetch_tasks(user_id),
        )?;

        Ok(ProfileSnapshot {
            profile,
            resume,
            preferences,
            health,
            tasks,
        })
    }

    /// Aggregate the user's profile into a trimmed, possibly empty string
    pub async fn aggregate(&self, user_id: &str) -> Result<String, ContextFetchError> {
        let context = self.snapshot(user_id).await?.render();
        debug!(
            "Aggregated {} bytes of context for user {}",
            context.len(),
            user_id
        );
        Ok(context)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        user_id: &str,
        source: ContextSource,
    ) -> Result<Option<T>, ContextFetchError> {
        let wrap = |error| ContextFetchError {
            source_name: source,
            error,
        };

        let value = self.store.select_by_id(table, user_id).await.optional().map_err(wrap)?;
        value
            .map(decode::<T>)
            .transpose()
            .map_err(wrap)
    }

    async fn fetch_tasks(&self, user_id: &str) -> Result<Vec<TaskRecord>, ContextFetchError> {
        let rows = self
            .store
            .select_recent(tables::TASKS, user_id, TASK_ORDER_COLUMN, self.task_limit)
            .await;

        rows.and_then(|rows| {
            rows.into_iter()
                .map(decode::<TaskRecord>)
                .collect::<StoreResult<Vec<_>>>()
        })
        .map_err(|error| ContextFetchError {
            source_name: ContextSource::Tasks,
            error,
        })
    }
}

/// Fixed persona template the system instruction is built from
#[derive(Debug, Clone)]
pub struct PersonaTemplate {
    name: String,
}

impl PersonaTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Build the system instruction, interpolating `context` when non-empty
    pub fn system_instruction(&self, context: &str) -> String {
        let mut prompt = format!(
            r#"You are {name}, a warm and practical personal assistant.
You help the user with their career, meals, health goals and day-to-day tasks.
Keep answers concise and actionable. When the user shares an image, describe what is relevant to their question before answering."#,
            name = self.name
        );

        let context = context.trim();
        if !context.is_empty() {
            prompt.push_str("\n\n## About the user\n");
            prompt.push_str(context);
            prompt.push_str(
                "\n\nUse this to personalise your answers. Do not recite it back unless asked.",
            );
        }

        prompt
    }
}

impl Default for PersonaTemplate {
    fn default() -> Self {
        Self::new("Lumen")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn full_snapshot() -> ProfileSnapshot {
        ProfileSnapshot {
            profile: Some(ProfileRecord {
                full_name: Some("Ada Lovelace".to_string()),
            }),
            resume: Some(ResumeRecord {
                summary: Some("Mathematician and writer".to_string()),
            }),
            preferences: Some(PreferenceRecord {
                interests: vec!["poetry".to_string(), "engines".to_string()],
                dislikes: vec![],
            }),
            health: Some(HealthRecord {
                goals: vec!["walk daily".to_string()],
                exclusions: vec!["peanuts".to_string(), " ".to_string()],
            }),
            tasks: vec![
                TaskRecord {
                    title: Some("Write notes on the engine".to_string()),
                    created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                },
                TaskRecord {
                    title: None,
                    created_at: Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
                },
            ],
        }
    }

    #[test]
    fn test_render_full_snapshot() {
        assert_eq!(
            full_snapshot().render(),
            "The user's name is Ada Lovelace. \
             Professional summary: Mathematician and writer. \
             Interests: poetry, engines. \
             Health goals: walk daily. \
             Dietary exclusions: peanuts. \
             Recent tasks: Write notes on the engine."
        );
    }

    #[test]
    fn test_render_empty_snapshot() {
        assert_eq!(ProfileSnapshot::default().render(), "");
    }

    #[test]
    fn test_render_skips_blank_fields() {
        let snapshot = ProfileSnapshot {
            profile: Some(ProfileRecord {
                full_name: Some("   ".to_string()),
            }),
            resume: Some(ResumeRecord {
                summary: Some("Ships things!".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(snapshot.render(), "Professional summary: Ships things!");
    }

    #[tokio::test]
    async fn test_aggregate_tolerates_null_columns() {
        use lumen_core::store::MemoryStore;
        use serde_json::json;

        let store = Arc::new(MemoryStore::new());
        store
            .upsert(
                tables::PREFERENCES,
                "u1",
                json!({"user_id": "u1", "interests": ["poetry"], "dislikes": null}),
            )
            .await
            .unwrap();
        store
            .upsert(
                tables::HEALTH_PROFILES,
                "u1",
                json!({"user_id": "u1", "goals": null, "exclusions": null}),
            )
            .await
            .unwrap();
        store.insert_row(
            tables::TASKS,
            "u1",
            json!({"user_id": "u1", "title": null, "created_at": "2024-05-02T09:00:00Z"}),
        );
        store.insert_row(
            tables::TASKS,
            "u1",
            json!({"user_id": "u1", "title": "Draft notes", "created_at": "2024-05-01T09:00:00Z"}),
        );

        let aggregator = ContextAggregator::new(store, 5);
        let context = aggregator.aggregate("u1").await.unwrap();
        assert_eq!(context, "Interests: poetry. Recent tasks: Draft notes.");
    }

    #[test]
    fn test_system_instruction_with_context() {
        let template = PersonaTemplate::new("Nova");
        let prompt = template.system_instruction("The user's name is Ada.");
        assert!(prompt.starts_with("You are Nova"));
        assert!(prompt.contains("## About the user\nThe user's name is Ada."));
    }

    #[test]
    fn test_system_instruction_without_context() {
        let prompt = PersonaTemplate::default().system_instruction("  ");
        assert!(prompt.starts_with("You are Lumen"));
        assert!(!prompt.contains("About the user"));
    }
}
