//! Configuration validation rules.

use super::schema::{Config, StorageBackend};

/// Validate configuration and return aggregated validation errors.
///
/// A missing Gemini API key is not a validation error: the session
/// builder reports it as a configuration error when a session is opened.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.assistant.model.trim().is_empty() {
        errors.push("assistant.model must not be empty".to_string());
    }
    if config.assistant.persona_name.trim().is_empty() {
        errors.push("assistant.persona_name must not be empty".to_string());
    }
    if config.assistant.task_limit == 0 {
        errors.push("assistant.task_limit must be > 0".to_string());
    }
    if config.assistant.max_output_tokens == 0 {
        errors.push("assistant.max_output_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.assistant.temperature) {
        errors.push("assistant.temperature must be in [0.0, 2.0]".to_string());
    }

    if config.providers.gemini.api_base.trim().is_empty() {
        errors.push("providers.gemini.api_base must not be empty".to_string());
    }

    match config.storage.backend {
        StorageBackend::File => {
            if config.storage.dir.trim().is_empty() {
                errors.push("storage.dir is required for the file backend".to_string());
            }
        }
        StorageBackend::Rest => {
            if config.storage.rest.url.trim().is_empty() {
                errors.push("storage.rest.url is required for the rest backend".to_string());
            }
            if config.storage.rest.api_key.trim().is_empty() {
                errors.push("storage.rest.api_key is required for the rest backend".to_string());
            }
        }
        StorageBackend::Memory => {}
    }

    if !matches!(config.logging.format.to_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be 'text' or 'json'".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
