//! Completion provider integrations for lumen
//!
//! This crate provides the completion-service abstraction and the Gemini
//! REST implementation.

pub mod base;
pub mod gemini;

pub use base::{
    CompletionProvider, CompletionRequest, ProviderConnector, ProviderError, ProviderResult,
};
pub use gemini::{GeminiClient, GeminiConnector};
