//! Fixed user-facing strings.
//!
//! Provider and store error text never reaches the visible turn sequence;
//! every failure surfaces as one of these instead.

/// Shown when no stored history exists
pub const GREETING: &str =
    "Hi! I'm here to help with your career, meals, health goals and tasks. What's on your mind?";

/// Shown when the session could not be started
pub const INIT_APOLOGY: &str =
    "Sorry, I couldn't start our conversation. Please check your settings and try resetting the chat.";

/// Substituted for the reply of a failed exchange
pub const COMPLETION_FALLBACK: &str =
    "Sorry, I'm having trouble responding right now. Please try again.";

/// Replaces the conversation after a successful reset
pub const RESET_CONFIRMATION: &str = "Chat history cleared. Let's start fresh! How can I help?";

/// Appended when a reset could not complete
pub const RESET_FAILED: &str =
    "Sorry, I couldn't reset the conversation. Your previous messages are still here.";
