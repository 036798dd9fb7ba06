//! Session error taxonomy

use lumen_core::store::StoreError;
use thiserror::Error;

/// Profile source a context lookup was reading from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Identity,
    Professional,
    Preferences,
    Health,
    Tasks,
}

impl std::fmt::Display for ContextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContextSource::Identity => "identity",
            ContextSource::Professional => "professional summary",
            ContextSource::Preferences => "preferences",
            ContextSource::Health => "health profile",
            ContextSource::Tasks => "tasks",
        };
        f.write_str(name)
    }
}

/// A profile lookup failed for a reason other than "not found"
#[derive(Error, Debug)]
#[error("failed to load {source_name} for context: {error}")]
pub struct ContextFetchError {
    pub source_name: ContextSource,
    #[source]
    pub error: StoreError,
}

/// The completion round trip failed.
///
/// Carries no detail on purpose: provider error text never reaches the user.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("completion request failed")]
pub struct CompletionFailure;

/// Errors raised by the session core
#[derive(Error, Debug)]
pub enum SessionError {
    /// Missing or unusable API key; no session is created
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    ContextFetch(#[from] ContextFetchError),

    #[error(transparent)]
    Completion(#[from] CompletionFailure),

    /// History read/write/delete failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// `save` was asked to persist a sequence with no user turn
    #[error("history must contain at least one user turn")]
    NoUserTurn,
}

pub type SessionResult<T> = Result<T, SessionError>;
