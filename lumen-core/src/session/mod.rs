//! Conversation data model
//!
//! Turns are the unit of conversation history shared by the completion
//! provider, the history store and the lifecycle controller.

pub mod attachment;
pub mod history;
pub mod turn;

pub use attachment::ImageAttachment;
pub use history::StoredHistory;
pub use turn::{has_user_turn, Part, Role, Turn};
