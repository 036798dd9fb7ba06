//! Session builder and live session handle

use lumen_core::session::{Part, Role, Turn};
use lumen_providers::{CompletionProvider, CompletionRequest, ProviderConnector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::context::PersonaTemplate;
use crate::error::{CompletionFailure, SessionError, SessionResult};

/// A provider-bound conversation.
///
/// The running history is private: it mirrors what the provider has seen
/// and is only extended by a successful [`SessionHandle::send`].
pub struct SessionHandle {
    provider: Arc<dyn CompletionProvider>,
    system_instruction: String,
    history: Vec<Turn>,
    timeout: Option<Duration>,
}

impl SessionHandle {
    /// The system instruction this session is bound to
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Perform one round trip with the bound history plus `parts`.
    ///
    /// Never retries. Any failure, including an elapsed timeout, is
    /// reported as a bare [`CompletionFailure`].
    pub async fn send(&mut self, parts: Vec<Part>) -> Result<String, CompletionFailure> {
        let user_turn = Turn::new(Role::User, parts).map_err(|_| CompletionFailure)?;

        let request = CompletionRequest {
            system_instruction: self.system_instruction.clone(),
            history: self.history.clone(),
            message: user_turn.parts().to_vec(),
        };

        debug!(
            "Sending turn with {} parts ({} prior turns) to {}",
            user_turn.parts().len(),
            self.history.len(),
            self.provider.model()
        );

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.provider.generate(request)).await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!("Completion request timed out after {:?}", limit);
                    return Err(CompletionFailure);
                }
            },
            None => self.provider.generate(request).await,
        };

        match result {
            Ok(text) => {
                self.history.push(user_turn);
                self.history.push(Turn::assistant_text(text.clone()));
                Ok(text)
            }
            Err(e) => {
                warn!("Completion request failed: {}", e);
                Err(CompletionFailure)
            }
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("model", &self.provider.model())
            .field("history_len", &self.history.len())
            .finish()
    }
}

/// Creates session handles bound to a persona
pub struct SessionBuilder {
    connector: Arc<dyn ProviderConnector>,
    persona: PersonaTemplate,
    timeout: Option<Duration>,
}

impl SessionBuilder {
    /// Create a new builder
    pub fn new(connector: Arc<dyn ProviderConnector>, persona: PersonaTemplate) -> Self {
        Self {
            connector,
            persona,
            timeout: None,
        }
    }

    /// Bound every exchange; a zero duration disables the limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Build a handle seeded with `prior_turns`.
    ///
    /// A missing or blank API key fails before any provider is created.
    pub fn build(
        &self,
        api_key: Option<&str>,
        prior_turns: Vec<Turn>,
        context: &str,
    ) -> SessionResult<SessionHandle> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SessionError::Configuration("API key is not set".to_string()))?;

        let provider = self
            .connector
            .connect(api_key)
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        Ok(SessionHandle {
            provider,
            system_instruction: self.persona.system_instruction(context),
            history: prior_turns,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lumen_providers::{ProviderError, ProviderResult};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        requests: Mutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn generate(&self, request: CompletionRequest) -> ProviderResult<String> {
            self.requests.lock().push(request);
            if self.fail {
                Err(ProviderError::ApiError("HTTP 500: internal detail".to_string()))
            } else {
                Ok("reply".to_string())
            }
        }

        fn model(&self) -> String {
            "recording".to_string()
        }
    }

    struct FixedConnector(Arc<RecordingProvider>);

    impl ProviderConnector for FixedConnector {
        fn connect(&self, _api_key: &str) -> ProviderResult<Arc<dyn CompletionProvider>> {
            Ok(self.0.clone())
        }
    }

    fn builder(provider: Arc<RecordingProvider>) -> SessionBuilder {
        SessionBuilder::new(Arc::new(FixedConnector(provider)), PersonaTemplate::default())
    }

    #[test]
    fn test_build_rejects_missing_key() {
        let builder = builder(Arc::new(RecordingProvider::default()));
        for key in [None, Some(""), Some("   ")] {
            let err = builder.build(key, Vec::new(), "").unwrap_err();
            assert!(matches!(err, SessionError::Configuration(_)));
        }
    }

    #[test]
    fn test_build_interpolates_context() {
        let builder = builder(Arc::new(RecordingProvider::default()));
        let handle = builder
            .build(Some("key"), Vec::new(), "The user's name is Ada.")
            .unwrap();
        assert!(handle.system_instruction().contains("The user's name is Ada."));
    }

    #[tokio::test]
    async fn test_send_carries_history_and_extends_it() {
        let provider = Arc::new(RecordingProvider::default());
        let mut handle = builder(provider.clone())
            .build(Some("key"), vec![Turn::assistant_text("Hi!")], "")
            .unwrap();

        assert_eq!(handle.send(vec![Part::text("one")]).await.unwrap(), "reply");
        handle.send(vec![Part::text("two")]).await.unwrap();

        let requests = provider.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].history.len(), 1);
        assert_eq!(requests[1].history.len(), 3);
        assert_eq!(requests[1].message, vec![Part::text("two")]);
    }

    #[tokio::test]
    async fn test_send_failure_hides_detail() {
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..Default::default()
        });
        let mut handle = builder(provider.clone())
            .build(Some("key"), Vec::new(), "")
            .unwrap();

        let err = handle.send(vec![Part::text("hello")]).await.unwrap_err();
        assert_eq!(err, CompletionFailure);
        assert!(!err.to_string().contains("internal detail"));

        // Failed exchanges do not extend the running history
        handle.send(vec![Part::text("again")]).await.unwrap_err();
        assert!(provider.requests.lock()[1].history.is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_empty_parts_without_request() {
        let provider = Arc::new(RecordingProvider::default());
        let mut handle = builder(provider.clone())
            .build(Some("key"), Vec::new(), "")
            .unwrap();

        assert!(handle.send(Vec::new()).await.is_err());
        assert!(provider.requests.lock().is_empty());
    }

    struct StalledProvider;

    #[async_trait]
    impl CompletionProvider for StalledProvider {
        async fn generate(&self, _request: CompletionRequest) -> ProviderResult<String> {
            std::future::pending::<()>().await;
            unreachable!()
        }

        fn model(&self) -> String {
            "stalled".to_string()
        }
    }

    struct StalledConnector;

    impl ProviderConnector for StalledConnector {
        fn connect(&self, _api_key: &str) -> ProviderResult<Arc<dyn CompletionProvider>> {
            Ok(Arc::new(StalledProvider))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_completion_failure() {
        let builder = SessionBuilder::new(Arc::new(StalledConnector), PersonaTemplate::default())
            .with_timeout(Duration::from_secs(30));
        let mut handle = builder.build(Some("key"), Vec::new(), "").unwrap();

        let err = handle.send(vec![Part::text("hello")]).await.unwrap_err();
        assert_eq!(err, CompletionFailure);
    }
}
