//! Slack Web API adapter
//!
//! Only `chat.postMessage` is needed. Slack reports most API failures with
//! HTTP 200 and `"ok": false`, so both layers are checked.

use async_trait::async_trait;
use relay_core::RelayConfig;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{endpoint, AdapterError, AdapterResult};

const POST_MESSAGE_PATH: &str = "/api/chat.postMessage";

/// Body of a `chat.postMessage` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostMessageRequest {
    pub channel: String,
    pub thread_ts: String,
    pub text: String,
    pub as_user: bool,
}

impl PostMessageRequest {
    /// Threaded reply posted as the bot user
    pub fn threaded_reply(
        channel: impl Into<String>,
        thread_ts: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: thread_ts.into(),
            text: text.into(),
            as_user: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Timestamp of the posted message
    #[serde(default)]
    pub ts: Option<String>,
}

/// Trait for the chat service replies are published to
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn post_message(&self, request: &PostMessageRequest) -> AdapterResult<PostMessageResponse>;
}

/// HTTP client for the Slack Web API
pub struct SlackClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

impl SlackClient {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> AdapterResult<Self> {
        let http = Client::builder()
            .user_agent(format!("relay-adapters/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AdapterError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            bot_token,
        })
    }

    pub fn from_config(config: &RelayConfig) -> AdapterResult<Self> {
        Self::new(
            config.slack_api_base_url.clone(),
            Secret::new(config.slack_bot_token.expose_secret().clone()),
        )
    }
}

#[async_trait]
impl ChatService for SlackClient {
    #[instrument(skip(self, request), fields(channel = %request.channel, thread_ts = %request.thread_ts))]
    async fn post_message(&self, request: &PostMessageRequest) -> AdapterResult<PostMessageResponse> {
        let url = endpoint(&self.base_url, POST_MESSAGE_PATH)?;
        debug!(url = %url, "Posting Slack message");

        let response = self
            .http
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.bot_token.expose_secret()),
            )
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        if !body.ok {
            return Err(AdapterError::Service(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        Ok(body)
    }
}
