//! Chat completion adapter
//!
//! Speaks the OpenAI-compatible `/v1/chat/completions` API.

use async_trait::async_trait;
use relay_core::RelayConfig;
use reqwest::{header, Client, Response};
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{endpoint, AdapterError, AdapterResult};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for a chat completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// A one-message conversation: the user's text and nothing else
    pub fn single_turn(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(content)],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first generated choice, if the service produced any
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }

    /// Why generation of the first choice stopped
    pub fn first_finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Trait for the text-completion capability
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run a chat completion and return the raw response
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> AdapterResult<ChatCompletionResponse>;
}

/// HTTP client for an OpenAI-compatible completion API
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> AdapterResult<Self> {
        let http = Client::builder()
            .user_agent(format!("relay-adapters/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AdapterError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &RelayConfig) -> AdapterResult<Self> {
        Self::new(
            config.openai_base_url.clone(),
            Secret::new(config.openai_api_key.expose_secret().clone()),
        )
    }

    async fn handle_response(&self, response: Response) -> AdapterResult<ChatCompletionResponse> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AdapterError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or(body);

        Err(AdapterError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> AdapterResult<ChatCompletionResponse> {
        let url = endpoint(&self.base_url, CHAT_COMPLETIONS_PATH)?;
        debug!(url = %url, "Requesting chat completion");

        let response = self
            .http
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(request)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
