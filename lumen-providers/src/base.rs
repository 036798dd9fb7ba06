//! Base trait for completion providers

use async_trait::async_trait;
use lumen_core::session::{Part, Turn};
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One stateless completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed instruction the conversation is bound to
    pub system_instruction: String,
    /// Prior turns, oldest first
    pub history: Vec<Turn>,
    /// Parts of the new user message
    pub message: Vec<Part>,
}

/// Trait for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Perform one request/response round trip and return the generated text
    async fn generate(&self, request: CompletionRequest) -> ProviderResult<String>;

    /// Model this provider sends requests to
    fn model(&self) -> String;
}

/// Creates provider clients bound to an API key
pub trait ProviderConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> ProviderResult<Arc<dyn CompletionProvider>>;
}
