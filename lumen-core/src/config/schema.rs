//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for lumen
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Assistant behaviour
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Completion provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Document store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.lumen/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Assistant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Model used for completions
    #[serde(default = "default_model")]
    pub model: String,
    /// Name the assistant introduces itself with
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    /// Completion timeout in seconds; 0 waits indefinitely
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How many recent tasks feed the user context
    #[serde(default = "default_task_limit")]
    pub task_limit: usize,
    /// Maximum tokens per reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_persona_name() -> String {
    "Lumen".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_task_limit() -> usize {
    5
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            persona_name: default_persona_name(),
            request_timeout_secs: default_request_timeout_secs(),
            task_limit: default_task_limit(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_gemini_api_base(),
        }
    }
}

/// Which document store backs profiles and history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON documents on local disk
    #[default]
    File,
    /// Process memory; nothing survives a restart
    Memory,
    /// Hosted PostgREST backend
    Rest,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the file backend
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default)]
    pub rest: RestStoreConfig,
}

fn default_storage_dir() -> String {
    "~/.lumen/data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
            rest: RestStoreConfig::default(),
        }
    }
}

/// Hosted data backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Signed-in user's JWT; requests use the anonymous role when empty
    #[serde(default)]
    pub access_token: String,
}
