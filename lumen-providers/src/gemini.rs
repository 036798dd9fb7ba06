//! Gemini REST client implementation

use async_trait::async_trait;
use lumen_core::config::{AssistantConfig, GeminiConfig};
use lumen_core::session::{Part, Role, Turn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::base::{
    CompletionProvider, CompletionRequest, ProviderConnector, ProviderError, ProviderResult,
};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// generateContent request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

/// generateContent response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Gemini provider client
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(api_key: impl Into<String>, api_base: Option<String>, model: Option<String>) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_output_tokens: 2048,
            temperature: 0.7,
        }
    }

    /// Override sampling parameters
    pub fn with_generation(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn build_request(&self, request: CompletionRequest) -> GenerateContentRequest {
        let system_instruction = if request.system_instruction.trim().is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: vec![WirePart::Text {
                    text: request.system_instruction,
                }],
            })
        };

        // The API requires the conversation to open with a user turn, so
        // leading assistant greetings are not sent.
        let mut contents: Vec<Content> = request
            .history
            .into_iter()
            .skip_while(|turn| !turn.is_user())
            .map(to_content)
            .collect();
        contents.push(Content {
            role: "user",
            parts: request.message.into_iter().map(to_wire_part).collect(),
        });

        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
        }
    }

    /// Parse the response into the generated text
    fn parse_response(response: GenerateContentResponse) -> ProviderResult<String> {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(ProviderError::InvalidResponse(format!(
                "prompt blocked: {}",
                reason
            )));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

fn to_content(turn: Turn) -> Content {
    let role = match turn.role() {
        Role::User => "user",
        Role::Assistant => "model",
    };
    Content {
        role,
        parts: turn.into_parts().into_iter().map(to_wire_part).collect(),
    }
}

fn to_wire_part(part: Part) -> WirePart {
    match part {
        Part::Text { content } => WirePart::Text { text: content },
        Part::Image { mime_type, data } => WirePart::InlineData {
            inline_data: InlineData { mime_type, data },
        },
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| {
            let message = wrapper.error.message.unwrap_or_default();
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{}: {}", status, message),
                _ => message,
            }
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn generate(&self, request: CompletionRequest) -> ProviderResult<String> {
        if request.message.is_empty() {
            return Err(ProviderError::ConfigError(
                "message must contain at least one part".to_string(),
            ));
        }

        let body = self.build_request(request);
        debug!(
            "Sending generateContent request to {} with model {} ({} contents)",
            self.api_base,
            self.model,
            body.contents.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status,
                api_error_message(&error_text)
            )));
        }

        let response_data: GenerateContentResponse = response.json().await?;
        Self::parse_response(response_data)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

/// Builds Gemini clients for a given API key
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    api_base: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiConnector {
    pub fn new(provider: &GeminiConfig, assistant: &AssistantConfig) -> Self {
        Self {
            api_base: provider.api_base.clone(),
            model: assistant.model.clone(),
            max_output_tokens: assistant.max_output_tokens,
            temperature: assistant.temperature,
        }
    }
}

impl ProviderConnector for GeminiConnector {
    fn connect(&self, api_key: &str) -> ProviderResult<Arc<dyn CompletionProvider>> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::ConfigError("API key is empty".to_string()));
        }
        let client = GeminiClient::new(
            api_key,
            Some(self.api_base.clone()),
            Some(self.model.clone()),
        )
        .with_generation(self.max_output_tokens, self.temperature);
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request(history: Vec<Turn>, message: Vec<Part>) -> CompletionRequest {
        CompletionRequest {
            system_instruction: "You are Lumen.".to_string(),
            history,
            message,
        }
    }

    #[test]
    fn test_build_request_shape() {
        let client = GeminiClient::new("key", None, Some("gemini-test".to_string()));
        let body = client.build_request(request(
            vec![
                Turn::assistant_text("Hi! How can I help?"),
                Turn::user_text("hello"),
                Turn::assistant_text("hi there"),
            ],
            vec![Part::text("what is this?"), Part::image("image/png", "aGVsbG8=")],
        ));

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You are Lumen."
        );
        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "what is this?");
        assert_eq!(
            contents[2]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(contents[2]["parts"][1]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_parse_response_concatenates_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hi "}, {"text": "there"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(GeminiClient::parse_response(response).unwrap(), "hi there");
    }

    #[test]
    fn test_parse_response_rejects_blocked_prompt() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = GeminiClient::parse_response(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            api_error_message(body),
            "INVALID_ARGUMENT: API key not valid"
        );
        assert_eq!(api_error_message("plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"candidates": [{"content": {"parts": [{"text": "hi there"}]}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = GeminiClient::new(
            "test-key",
            Some(server.url()),
            Some("gemini-test".to_string()),
        );
        let reply = client
            .generate(request(Vec::new(), vec![Part::text("hello")]))
            .await
            .unwrap();

        assert_eq!(reply, "hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_maps_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(
            "test-key",
            Some(server.url()),
            Some("gemini-test".to_string()),
        );
        let err = client
            .generate(request(Vec::new(), vec![Part::text("hello")]))
            .await
            .unwrap_err();

        match err {
            ProviderError::ApiError(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("RESOURCE_EXHAUSTED"));
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_connector_rejects_empty_key() {
        let connector = GeminiConnector::new(&GeminiConfig::default(), &AssistantConfig::default());
        assert!(connector.connect("  ").is_err());
        assert!(connector.connect("key").is_ok());
    }
}
