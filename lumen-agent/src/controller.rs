//! Session lifecycle controller
//!
//! Orchestrates aggregation, session building, exchange and persistence on
//! three triggers: initialize, send and reset. Owns the visible turn
//! sequence; at most one trigger runs at a time and the others are rejected.

use lumen_core::config::Config;
use lumen_core::session::{has_user_turn, ImageAttachment, Part, Role, Turn};
use lumen_core::store::DocumentStore;
use lumen_providers::ProviderConnector;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::context::{ContextAggregator, PersonaTemplate};
use crate::error::SessionResult;
use crate::history::HistoryStore;
use crate::messages;
use crate::session::{SessionBuilder, SessionHandle};

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Exchanging,
    Resetting,
}

impl SessionState {
    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Initializing | SessionState::Exchanging | SessionState::Resetting
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Exchanging => "exchanging",
            SessionState::Resetting => "resetting",
        };
        f.write_str(name)
    }
}

/// What callers get to see: the turn sequence and a loading flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub turns: Vec<Turn>,
    pub loading: bool,
}

/// Why a trigger was ignored. The visible state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    #[error("another operation is in progress ({0})")]
    Busy(SessionState),

    #[error("message has no text and no image")]
    EmptyMessage,

    #[error("no active session; reset to try again")]
    NoSession,

    #[error("session has not been initialized")]
    NotInitialized,
}

struct Inner {
    state: SessionState,
    turns: Vec<Turn>,
    handle: Option<SessionHandle>,
    user_id: String,
    api_key: Option<String>,
}

impl Inner {
    fn view(&self) -> SessionView {
        SessionView {
            turns: self.turns.clone(),
            loading: self.state.is_busy(),
        }
    }
}

/// Puts the controller back in a usable state if the future running a
/// trigger is dropped before it finishes.
struct InFlight<'a> {
    inner: &'a Mutex<Inner>,
    restore: SessionState,
    closing_turn: Option<&'static str>,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(inner: &'a Mutex<Inner>, restore: SessionState) -> Self {
        Self {
            inner,
            restore,
            closing_turn: None,
            done: false,
        }
    }

    /// Append this turn if abandoned, keeping the sequence alternating
    fn closing_turn(mut self, text: &'static str) -> Self {
        self.closing_turn = Some(text);
        self
    }

    fn finish(mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut inner = self.inner.lock();
        warn!(
            "Operation abandoned while {}; returning to {}",
            inner.state, self.restore
        );
        if let Some(text) = self.closing_turn {
            inner.turns.push(Turn::assistant_text(text));
        }
        inner.state = self.restore;
    }
}

/// Drives one user's conversation
pub struct SessionController {
    aggregator: ContextAggregator,
    builder: SessionBuilder,
    history: HistoryStore,
    inner: Mutex<Inner>,
}

impl SessionController {
    /// Create a new controller
    pub fn new(aggregator: ContextAggregator, builder: SessionBuilder, history: HistoryStore) -> Self {
        Self {
            aggregator,
            builder,
            history,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                turns: Vec::new(),
                handle: None,
                user_id: String::new(),
                api_key: None,
            }),
        }
    }

    /// Wire a controller from the loaded configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        connector: Arc<dyn ProviderConnector>,
    ) -> Self {
        let assistant = &config.assistant;
        let aggregator = ContextAggregator::new(store.clone(), assistant.task_limit);
        let builder = SessionBuilder::new(connector, PersonaTemplate::new(&assistant.persona_name))
            .with_timeout(Duration::from_secs(assistant.request_timeout_secs));
        Self::new(aggregator, builder, HistoryStore::new(store))
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Snapshot of the visible sequence
    pub fn view(&self) -> SessionView {
        self.inner.lock().view()
    }

    /// Start (or restart) the session for `user_id`.
    ///
    /// Always ends in `Ready`: with the stored history, the greeting when
    /// nothing is stored, or the apology when the session could not be built.
    pub async fn initialize_session(
        &self,
        user_id: &str,
        api_key: Option<&str>,
    ) -> Result<SessionView, Rejected> {
        let guard = {
            let mut inner = self.inner.lock();
            if inner.state.is_busy() {
                return Err(Rejected::Busy(inner.state));
            }
            let guard = InFlight::new(&self.inner, inner.state);
            inner.state = SessionState::Initializing;
            inner.user_id = user_id.to_string();
            inner.api_key = api_key.map(str::to_string);
            guard
        };
        info!("Initializing session for user {}", user_id);

        let outcome = self.start(user_id, api_key).await;

        guard.finish();
        let mut inner = self.inner.lock();
        match outcome {
            Ok((handle, turns)) => {
                info!(
                    "Session ready for user {} with {} turns",
                    user_id,
                    turns.len()
                );
                inner.handle = Some(handle);
                inner.turns = turns;
            }
            Err(e) => {
                error!("Failed to initialize session for user {}: {}", user_id, e);
                inner.handle = None;
                inner.turns = vec![Turn::assistant_text(messages::INIT_APOLOGY)];
            }
        }
        inner.state = SessionState::Ready;
        Ok(inner.view())
    }

    async fn start(
        &self,
        user_id: &str,
        api_key: Option<&str>,
    ) -> SessionResult<(SessionHandle, Vec<Turn>)> {
        let context = match self.aggregator.aggregate(user_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Continuing without user context: {}", e);
                String::new()
            }
        };

        let stored = self.history.load(user_id).await?;
        let prior = stored.clone().unwrap_or_default();
        let handle = self.builder.build(api_key, prior, &context)?;

        let turns = stored.unwrap_or_else(|| vec![Turn::assistant_text(messages::GREETING)]);
        Ok((handle, turns))
    }

    /// Send a user message with optional image.
    ///
    /// The user turn is shown immediately. A failed exchange appends the
    /// fixed fallback reply and writes nothing to the store.
    pub async fn send_message(
        &self,
        text: &str,
        image: Option<ImageAttachment>,
    ) -> Result<SessionView, Rejected> {
        let mut parts = Vec::new();
        if !text.trim().is_empty() {
            parts.push(Part::text(text));
        }
        if let Some(image) = image {
            parts.push(image.into_part());
        }
        let user_turn = Turn::new(Role::User, parts).map_err(|_| Rejected::EmptyMessage)?;

        let (mut handle, user_id, mut guard) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Ready => {}
                SessionState::Uninitialized => return Err(Rejected::NotInitialized),
                busy => return Err(Rejected::Busy(busy)),
            }
            let handle = inner.handle.take().ok_or(Rejected::NoSession)?;
            inner.turns.push(user_turn.clone());
            inner.state = SessionState::Exchanging;
            let guard = InFlight::new(&self.inner, SessionState::Ready)
                .closing_turn(messages::COMPLETION_FALLBACK);
            (handle, inner.user_id.clone(), guard)
        };

        let reply = handle.send(user_turn.into_parts()).await;

        let to_save = {
            let mut inner = self.inner.lock();
            inner.handle = Some(handle);
            guard.closing_turn = None;
            match reply {
                Ok(text) => {
                    inner.turns.push(Turn::assistant_text(text));
                    Some(inner.turns.clone())
                }
                Err(e) => {
                    debug!("Substituting fallback reply: {}", e);
                    inner.turns.push(Turn::assistant_text(messages::COMPLETION_FALLBACK));
                    None
                }
            }
        };

        if let Some(turns) = to_save.filter(|turns| has_user_turn(turns)) {
            if let Err(e) = self.history.save(&user_id, &turns).await {
                warn!("Failed to save history for user {}: {}", user_id, e);
            }
        }

        guard.finish();
        let mut inner = self.inner.lock();
        inner.state = SessionState::Ready;
        Ok(inner.view())
    }

    /// Clear stored history and start over with a fresh session.
    ///
    /// On failure the current sequence is kept and an error turn appended.
    pub async fn reset_session(&self) -> Result<SessionView, Rejected> {
        let (user_id, api_key) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Ready => {}
                SessionState::Uninitialized => return Err(Rejected::NotInitialized),
                busy => return Err(Rejected::Busy(busy)),
            }
            inner.state = SessionState::Resetting;
            (inner.user_id.clone(), inner.api_key.clone())
        };
        let guard = InFlight::new(&self.inner, SessionState::Ready);
        info!("Resetting session for user {}", user_id);

        let outcome = self.restart(&user_id, api_key.as_deref()).await;

        guard.finish();
        let mut inner = self.inner.lock();
        match outcome {
            Ok(handle) => {
                info!("Session reset for user {}", user_id);
                inner.handle = Some(handle);
                inner.turns = vec![Turn::assistant_text(messages::RESET_CONFIRMATION)];
            }
            Err(e) => {
                warn!("Failed to reset session for user {}: {}", user_id, e);
                inner.turns.push(Turn::assistant_text(messages::RESET_FAILED));
            }
        }
        inner.state = SessionState::Ready;
        Ok(inner.view())
    }

    async fn restart(&self, user_id: &str, api_key: Option<&str>) -> SessionResult<SessionHandle> {
        self.history.clear(user_id).await?;

        self.inner.lock().state = SessionState::Initializing;
        let context = self.aggregator.aggregate(user_id).await?;
        self.builder.build(api_key, Vec::new(), &context)
    }
}
