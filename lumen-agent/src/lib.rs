//! Conversational session core for lumen
//!
//! This crate provides context aggregation, session building, message
//! exchange, history persistence and the session lifecycle controller.

pub mod context;
pub mod controller;
pub mod error;
pub mod history;
pub mod messages;
pub mod session;

pub use context::{ContextAggregator, PersonaTemplate, ProfileSnapshot};
pub use controller::{Rejected, SessionController, SessionState, SessionView};
pub use error::{CompletionFailure, ContextFetchError, ContextSource, SessionError, SessionResult};
pub use history::HistoryStore;
pub use session::{SessionBuilder, SessionHandle};
